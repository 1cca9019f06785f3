//! Decides which semantic shape a token stream has.
//!
//! The dialect is defined by the editor's output rather than a grammar, so
//! classification is a fixed decision list instead of scattered conditionals;
//! a new quirk gets a new entry without touching the others.

use crate::option_set::OptionSet;
use crate::token::{Keyword, PathOp, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    StandaloneNode,
    SimpleWire,
    MultiSegmentPath,
    ComponentOnPath,
    GroupOpen,
    GroupClose,
    Unrecognized,
}

/// Classifies one statement. Decision list, first match wins:
///
/// 1. `\begin{scope}` / `\end{scope}` markers are group open/close.
/// 2. `\node` and `\coordinate` statements without a path operator are
///    standalone nodes.
/// 3. `\draw` / `\path` with exactly one path operator whose following
///    option block names a known component type is a component on a path.
///    This outranks the wire reading.
/// 4. `\draw` / `\path` with one path operator is a simple wire, with two
///    or more a multi-segment path.
/// 5. Everything else is unrecognized and will be skipped with a warning.
pub fn classify(tokens: &[Token]) -> StatementKind {
    let Some(first) = tokens.first() else {
        return StatementKind::Unrecognized;
    };
    match first.kind {
        TokenKind::Keyword(Keyword::ScopeBegin) => return StatementKind::GroupOpen,
        TokenKind::Keyword(Keyword::ScopeEnd) => return StatementKind::GroupClose,
        TokenKind::Keyword(Keyword::Node | Keyword::Coordinate) => {
            return if path_op_count(tokens) == 0 {
                StatementKind::StandaloneNode
            } else {
                StatementKind::Unrecognized
            };
        }
        TokenKind::Keyword(Keyword::Draw | Keyword::Path) => {}
        _ => return StatementKind::Unrecognized,
    }
    let ops = path_op_count(tokens);
    if ops == 1 && component_option(tokens).is_some() {
        return StatementKind::ComponentOnPath;
    }
    match ops {
        0 => StatementKind::Unrecognized,
        1 => StatementKind::SimpleWire,
        _ => StatementKind::MultiSegmentPath,
    }
}

fn path_op_count(tokens: &[Token]) -> usize {
    tokens
        .iter()
        .filter(|t| matches!(t.kind, TokenKind::PathOp(_)))
        .count()
}

/// The canonical component type declared by the option block directly after
/// a `to`, if any.
pub(crate) fn component_option(tokens: &[Token]) -> Option<&'static str> {
    let mut after_to = false;
    for token in tokens {
        if after_to {
            if token.kind == TokenKind::OptionBlock {
                let options = OptionSet::parse(token.lexeme);
                return options.first_key().and_then(component_kind);
            }
            after_to = false;
        }
        if token.kind == TokenKind::PathOp(PathOp::To) {
            after_to = true;
        }
    }
    None
}

/// Canonical id for a circuitikz component option name. The list covers
/// what the originating editor emits; anything else keeps the statement a
/// wire or a plain node.
pub fn component_kind(name: &str) -> Option<&'static str> {
    let kind = match name.trim() {
        "R" | "resistor" | "american resistor" | "european resistor" | "vR" | "pR"
        | "potentiometer" => "R",
        "C" | "capacitor" | "polar capacitor" | "ecapacitor" | "curved capacitor" | "vC" => "C",
        "L" | "inductor" | "cute inductor" | "american inductor" | "european inductor" | "vL" => {
            "L"
        }
        "D" | "diode" | "empty diode" | "full diode" | "schottky diode" | "zener diode" | "led"
        | "empty led" => "D",
        "V" | "vsource" | "american voltage source" | "european voltage source" | "battery"
        | "battery1" | "battery2" => "V",
        "I" | "isource" | "american current source" | "european current source" => "I",
        "sV" | "vsourcesin" | "sI" | "isourcesin" => "sV",
        "short" => "short",
        "open" => "open",
        "ground" | "rground" | "tlground" => "ground",
        "npn" => "npn",
        "pnp" => "pnp",
        "nmos" => "nmos",
        "pmos" => "pmos",
        "op amp" => "op amp",
        "lamp" | "bulb" => "lamp",
        "switch" | "normal open switch" | "nos" | "normal closed switch" | "ncs" => "switch",
        "fuse" | "afuse" => "fuse",
        "crystal" => "crystal",
        "ammeter" => "ammeter",
        "voltmeter" => "voltmeter",
        "american and port" => "and",
        "american or port" => "or",
        "american not port" => "not",
        "american xor port" => "xor",
        "american nand port" => "nand",
        "american nor port" => "nor",
        _ => return None,
    };
    Some(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;
    use rstest::*;

    fn classify_str(input: &str) -> StatementKind {
        classify(&tokenize(input).unwrap())
    }

    #[rstest]
    #[case("\\node (A) at (0,0) {in};", StatementKind::StandaloneNode)]
    #[case("\\coordinate (P) at (1,2);", StatementKind::StandaloneNode)]
    #[case("\\draw (0,0) -- (1,0);", StatementKind::SimpleWire)]
    #[case("\\draw (0,0) -- (1,0) -- (1,1);", StatementKind::MultiSegmentPath)]
    #[case("\\draw (0,0) to[R, l=$R_1$] (2,0);", StatementKind::ComponentOnPath)]
    #[case("\\draw (0,0) to[bogus thing] (2,0);", StatementKind::SimpleWire)]
    #[case("\\path (0,0) -| (2,1);", StatementKind::SimpleWire)]
    #[case("\\begin{scope}[name=left]", StatementKind::GroupOpen)]
    #[case("\\end{scope}", StatementKind::GroupClose)]
    #[case("\\draw (0,0);", StatementKind::Unrecognized)]
    fn classifies_statements(#[case] input: &str, #[case] expected: StatementKind) {
        assert_eq!(classify_str(input), expected);
    }

    #[test]
    fn component_reading_outranks_simple_wire() {
        // One path op plus a known type: the tie-break picks the component.
        assert_eq!(
            classify_str("\\draw[thick] (0,0) to[C] (0,2);"),
            StatementKind::ComponentOnPath
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let input = "\\draw (0,0) to[R] (2,0);";
        let first = classify_str(input);
        for _ in 0..10 {
            assert_eq!(classify_str(input), first);
        }
    }
}
