//! Token model for one drawing statement.

use serde::{Serialize, Serializer};

mod lexer;

pub use lexer::tokenize;

/// One lexeme of a statement. Delimited regions (option blocks, text,
/// coordinates) arrive as a single token whose lexeme spans the whole
/// region, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    /// Byte offset into the statement text.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword(Keyword),
    Coordinate,
    OptionBlock,
    Text,
    PathOp(PathOp),
    Delimiter,
}

/// Command words of the dialect. `InlineNode` is the bare `node` that
/// annotates a path point; `Node` is the `\node` that opens a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Draw,
    Path,
    Node,
    InlineNode,
    Coordinate,
    At,
    ScopeBegin,
    ScopeEnd,
}

/// Connectors between path points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathOp {
    /// `--`
    Line,
    /// `to`
    To,
    /// `|-`
    VertHoriz,
    /// `-|`
    HorizVert,
}

impl PathOp {
    pub fn as_str(self) -> &'static str {
        match self {
            PathOp::Line => "--",
            PathOp::To => "to",
            PathOp::VertHoriz => "|-",
            PathOp::HorizVert => "-|",
        }
    }
}

impl Serialize for PathOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
