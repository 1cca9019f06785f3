//! Coordinate forms of the dialect.

use crate::error::BuildError;

/// A coordinate as written, before resolution. Relative offsets resolve
/// against the current point of the statement; named references resolve
/// against the document's name table in a later pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Coord {
    Absolute { x: f64, y: f64 },
    Relative { dx: f64, dy: f64 },
    Named { name: String, anchor: Option<String> },
}

impl Coord {
    /// Parses a coordinate lexeme such as `(1.5, 2)`, `++(0,1)`, `(A)` or
    /// `([yshift=0.04cm]X1.north east)`. Polar and calc forms are not part
    /// of the dialect and are rejected as unsupported.
    pub fn parse(lexeme: &str) -> Result<Self, BuildError> {
        let trimmed = lexeme.trim();
        let relative = trimmed.starts_with('+');
        let body = trimmed.trim_start_matches('+');
        let body = body
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(|| BuildError::MalformedCoordinate(lexeme.to_owned()))?;
        let mut body = body.trim();
        if body.contains('$') || body.contains(':') {
            return Err(BuildError::UnsupportedCoordinate(lexeme.to_owned()));
        }
        // A leading [xshift=...] block only nudges a label anchor; the
        // editor re-derives it on import, so it is dropped here.
        if body.starts_with('[') {
            match body.find(']') {
                Some(end) => body = body[end + 1..].trim(),
                None => return Err(BuildError::MalformedCoordinate(lexeme.to_owned())),
            }
        }
        if let Some((x, y)) = body.split_once(',') {
            let x = parse_scalar(x).ok_or_else(|| BuildError::MalformedCoordinate(lexeme.to_owned()))?;
            let y = parse_scalar(y).ok_or_else(|| BuildError::MalformedCoordinate(lexeme.to_owned()))?;
            return Ok(if relative {
                Coord::Relative { dx: x, dy: y }
            } else {
                Coord::Absolute { x, y }
            });
        }
        if relative {
            return Err(BuildError::MalformedCoordinate(lexeme.to_owned()));
        }
        let (name, anchor) = match body.split_once('.') {
            Some((name, anchor)) => (name.trim(), Some(anchor.trim().to_owned())),
            None => (body, None),
        };
        if name.is_empty() {
            return Err(BuildError::MalformedCoordinate(lexeme.to_owned()));
        }
        Ok(Coord::Named {
            name: name.to_owned(),
            anchor,
        })
    }
}

/// Parses one coordinate component with an optional TeX unit suffix,
/// normalized to centimeters.
fn parse_scalar(s: &str) -> Option<f64> {
    let s = s.trim();
    for (suffix, factor) in [("cm", 1.0), ("mm", 0.1), ("in", 2.54), ("pt", 2.54 / 72.27)] {
        if let Some(number) = s.strip_suffix(suffix) {
            return number.trim().parse::<f64>().ok().map(|v| v * factor);
        }
    }
    s.parse().ok()
}
