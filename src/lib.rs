//! Converts circuit drawings written in the circuitikz dialect of a circuit
//! editor into a structured JSON document.
//!
//! The input is the body of a `tikzpicture` environment. Conversion runs in
//! stages: comments are blanked, the body is sliced into statements, each
//! statement is tokenized and classified, and a builder turns the classified
//! statements into elements with names resolved across the whole document.
//! A statement that cannot be converted is dropped whole and reported as a
//! [`Diagnostic`]; the rest of the document still converts.
//!
//! ```
//! let body = r"\draw (0,0) to[R, l=$R_1$] (2,0);";
//! let conversion = circuitikz_json::convert_drawing(body);
//! assert!(conversion.diagnostics().is_empty());
//! assert_eq!(conversion.document().elements.len(), 1);
//! ```

mod build;
mod classify;
mod coord;
mod document;
mod error;
mod option_set;
mod split;
mod token;

pub use classify::{classify, component_kind, StatementKind};
pub use coord::Coord;
pub use document::{Bounds, Document, Element, PathLabel, Point, Scale};
pub use error::{BuildError, Diagnostic, DiagnosticKind, LexError, LexErrorKind};
pub use option_set::{OptionSet, OptionValue};
pub use split::{split_statements, strip_comments, RawStatement};
pub use token::{tokenize, Keyword, PathOp, Token, TokenKind};

use build::Builder;

/// The outcome of a conversion: the assembled document plus every warning
/// produced along the way. Conversion itself never fails; an input that is
/// entirely noise yields an empty document and one diagnostic per statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    document: Document,
    diagnostics: Vec<Diagnostic>,
}

impl Conversion {
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (Document, Vec<Diagnostic>) {
        (self.document, self.diagnostics)
    }
}

/// Converts one drawing body. Offsets in the returned diagnostics are byte
/// positions into `body`.
pub fn convert_drawing(body: &str) -> Conversion {
    let stripped = strip_comments(body);
    let statements = split_statements(&stripped);
    let mut builder = Builder::new();
    let mut lex_diagnostics = Vec::new();
    for (index, statement) in statements.iter().enumerate() {
        match tokenize(statement.text) {
            Ok(tokens) => {
                let kind = classify(&tokens);
                builder.apply(index, statement.offset, kind, &tokens);
            }
            Err(err) => lex_diagnostics.push(Diagnostic {
                statement_index: index,
                offset: statement.offset + err.offset,
                kind: DiagnosticKind::Lex,
                message: err.kind.to_string(),
            }),
        }
    }
    let (elements, mut diagnostics) = builder.finish();
    diagnostics.extend(lex_diagnostics);
    diagnostics.sort_by_key(|d| (d.statement_index, d.offset));
    Conversion {
        document: Document::assemble(elements),
        diagnostics,
    }
}
