use serde::Serialize;
use thiserror::Error;

/// Why the scanner gave up on a statement.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexErrorKind {
    #[error("unbalanced `{0}`")]
    Unbalanced(char),
    #[error("unterminated option block")]
    UnterminatedOptionBlock,
    #[error("unterminated text region")]
    UnterminatedText,
    #[error("unterminated coordinate")]
    UnterminatedCoordinate,
    #[error("unterminated math region")]
    UnterminatedMath,
    #[default]
    #[error("unexpected character")]
    UnexpectedCharacter,
}

/// Scanner failure for one statement. The offset is relative to the
/// statement text handed to [`crate::tokenize`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub kind: LexErrorKind,
}

/// Statement-level build failures. None of these abort the document;
/// each one becomes a [`Diagnostic`] and the statement contributes nothing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("reference to undefined point `{0}`")]
    UnresolvedReference(String),
    #[error("circular reference through point `{0}`")]
    CircularReference(String),
    #[error("relative coordinate has no preceding point")]
    RelativeWithoutAnchor,
    #[error("malformed coordinate `{0}`")]
    MalformedCoordinate(String),
    #[error("unsupported coordinate form `{0}`")]
    UnsupportedCoordinate(String),
    #[error("statement has no position coordinate")]
    MissingCoordinate,
    #[error("\\coordinate statement has no name")]
    MissingName,
    #[error("a path needs at least two points")]
    ShortPath,
    #[error("statement shape not recognized")]
    UnrecognizedStatement,
    #[error("\\end{{scope}} without matching \\begin{{scope}}")]
    UnmatchedGroupClose,
    #[error("scope opened here was never closed")]
    UnclosedGroup,
}

impl BuildError {
    pub fn diagnostic_kind(&self) -> DiagnosticKind {
        match self {
            BuildError::UnresolvedReference(_) | BuildError::CircularReference(_) => {
                DiagnosticKind::UnresolvedReference
            }
            BuildError::UnmatchedGroupClose | BuildError::UnclosedGroup => {
                DiagnosticKind::Structural
            }
            _ => DiagnosticKind::Unrecognized,
        }
    }
}

/// Coarse diagnostic category, mirroring the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    Lex,
    Unrecognized,
    UnresolvedReference,
    Structural,
}

/// One warning attached to a skipped statement or dropped element.
/// Offsets are byte positions into the drawing body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub statement_index: usize,
    pub offset: usize,
    pub kind: DiagnosticKind,
    pub message: String,
}
