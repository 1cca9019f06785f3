use logos::{Lexer, Logos};

use super::{Keyword, PathOp, Token, TokenKind};
use crate::error::{LexError, LexErrorKind};

/// Scans one statement into tokens, or fails at the first unbalanced or
/// unterminated region. A failed statement yields no tokens at all.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut lexer = RawToken::lexer(input);
    let mut tokens = Vec::new();
    while let Some(item) = lexer.next() {
        match item {
            Ok(raw) => tokens.push(Token {
                kind: raw.kind(),
                lexeme: lexer.slice(),
                offset: lexer.span().start,
            }),
            Err(kind) => {
                return Err(LexError {
                    offset: lexer.span().start,
                    kind,
                })
            }
        }
    }
    Ok(tokens)
}

#[derive(Logos, Clone, Copy, Debug, PartialEq, Eq)]
#[logos(error = LexErrorKind)]
enum RawToken {
    #[token(r"\draw")]
    Draw,
    #[token(r"\path")]
    Path,
    #[token(r"\node")]
    Node,
    #[token(r"\coordinate")]
    Coordinate,
    #[token(r"\begin{scope}")]
    ScopeBegin,
    #[token(r"\end{scope}")]
    ScopeEnd,
    #[token("node")]
    InlineNode,
    #[token("at")]
    At,
    #[token("--")]
    Line,
    #[token("|-")]
    VertHoriz,
    #[token("-|")]
    HorizVert,
    #[token("to")]
    To,
    #[token(";")]
    Semicolon,
    #[regex(r"\+?\+?\(", lex_coordinate)]
    CoordinateRegion,
    #[token("[", lex_option_block)]
    OptionBlock,
    #[token("{", lex_text)]
    TextRegion,
    #[regex(r"[ \t\r\f\n]+", logos::skip)]
    WS,
}

impl RawToken {
    fn kind(self) -> TokenKind {
        match self {
            RawToken::Draw => TokenKind::Keyword(Keyword::Draw),
            RawToken::Path => TokenKind::Keyword(Keyword::Path),
            RawToken::Node => TokenKind::Keyword(Keyword::Node),
            RawToken::Coordinate => TokenKind::Keyword(Keyword::Coordinate),
            RawToken::ScopeBegin => TokenKind::Keyword(Keyword::ScopeBegin),
            RawToken::ScopeEnd => TokenKind::Keyword(Keyword::ScopeEnd),
            RawToken::InlineNode => TokenKind::Keyword(Keyword::InlineNode),
            RawToken::At => TokenKind::Keyword(Keyword::At),
            RawToken::Line => TokenKind::PathOp(PathOp::Line),
            RawToken::VertHoriz => TokenKind::PathOp(PathOp::VertHoriz),
            RawToken::HorizVert => TokenKind::PathOp(PathOp::HorizVert),
            RawToken::To => TokenKind::PathOp(PathOp::To),
            RawToken::Semicolon => TokenKind::Delimiter,
            RawToken::CoordinateRegion => TokenKind::Coordinate,
            RawToken::OptionBlock => TokenKind::OptionBlock,
            RawToken::TextRegion => TokenKind::Text,
            RawToken::WS => unreachable!(),
        }
    }
}

fn lex_coordinate(lex: &mut Lexer<RawToken>) -> Result<(), LexErrorKind> {
    lex_region(lex, 2, LexErrorKind::UnterminatedCoordinate)
}

fn lex_option_block(lex: &mut Lexer<RawToken>) -> Result<(), LexErrorKind> {
    lex_region(lex, 1, LexErrorKind::UnterminatedOptionBlock)
}

fn lex_text(lex: &mut Lexer<RawToken>) -> Result<(), LexErrorKind> {
    lex_region(lex, 0, LexErrorKind::UnterminatedText)
}

/// Bumps the lexer past the matching closing delimiter of the region whose
/// opening delimiter was just consumed. `own` indexes the delimiter pair of
/// the region itself (0 braces, 1 brackets, 2 parens); the other two pairs
/// are tracked so a closer inside a nested region of another kind does not
/// end this one. `$...$` math and `\`-escapes hide delimiters entirely.
fn lex_region(lex: &mut Lexer<RawToken>, own: usize, unterminated: LexErrorKind) -> Result<(), LexErrorKind> {
    let mut depths = [0usize; 3];
    depths[own] = 1;
    let mut math = false;
    let mut escape = false;
    let mut len = 0usize;
    for ch in lex.remainder().chars() {
        len += ch.len_utf8();
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '$' => math = !math,
            _ if math => {}
            _ => {
                let Some((pair, opening)) = delimiter_index(ch) else {
                    continue;
                };
                if opening {
                    depths[pair] += 1;
                } else {
                    if depths[pair] == 0 {
                        return Err(LexErrorKind::Unbalanced(ch));
                    }
                    depths[pair] -= 1;
                    if pair == own && depths[own] == 0 {
                        if depths.iter().any(|&d| d != 0) {
                            return Err(LexErrorKind::Unbalanced(ch));
                        }
                        lex.bump(len);
                        return Ok(());
                    }
                }
            }
        }
    }
    if math {
        Err(LexErrorKind::UnterminatedMath)
    } else {
        Err(unterminated)
    }
}

fn delimiter_index(ch: char) -> Option<(usize, bool)> {
    match ch {
        '{' => Some((0, true)),
        '}' => Some((0, false)),
        '[' => Some((1, true)),
        ']' => Some((1, false)),
        '(' => Some((2, true)),
        ')' => Some((2, false)),
        _ => None,
    }
}
