//! Option lists of the form `[key, key=value, key={nested, value}]`.

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::document::Scale;

/// Parsed option block. Keys are case-sensitive; a duplicate key keeps its
/// first position but takes the last value written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OptionSet {
    entries: IndexMap<String, OptionValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag,
    Str(String),
    List(Vec<String>),
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Flag => serializer.serialize_bool(true),
            OptionValue::Str(value) => serializer.serialize_str(value),
            OptionValue::List(items) => items.serialize(serializer),
        }
    }
}

impl OptionSet {
    /// Parses an option block lexeme. The scanner has already verified the
    /// block is balanced, so parsing cannot fail; a stray empty entry is
    /// dropped. Commas inside braces or `$...$` math never split.
    pub fn parse(lexeme: &str) -> Self {
        let body = lexeme.trim();
        let body = body
            .strip_prefix('[')
            .and_then(|b| b.strip_suffix(']'))
            .unwrap_or(body);
        let mut set = OptionSet::default();
        for part in split_top_level(body, ',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match split_key_value(part) {
                Some((key, value)) => {
                    let value = value.trim();
                    let braced = value.starts_with('{') && value.ends_with('}');
                    let value = value
                        .strip_prefix('{')
                        .and_then(|v| v.strip_suffix('}'))
                        .unwrap_or(value);
                    let items = split_top_level(value, ',');
                    let value = if braced && items.len() > 1 {
                        OptionValue::List(items.into_iter().map(|s| s.trim().to_owned()).collect())
                    } else {
                        OptionValue::Str(value.to_owned())
                    };
                    set.entries.insert(key.trim().to_owned(), value);
                }
                None => {
                    set.entries.insert(part.to_owned(), OptionValue::Flag);
                }
            }
        }
        set
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.get(key)
    }

    pub fn str_value(&self, key: &str) -> Option<&str> {
        match self.entries.get(key) {
            Some(OptionValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn first_key(&self) -> Option<&str> {
        self.entries.get_index(0).map(|(key, _)| key.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Folds `other` in, later writes winning.
    pub fn merge(&mut self, other: OptionSet) {
        for (key, value) in other.entries {
            self.entries.insert(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.entries.shift_remove(key)
    }

    /// Removes the entry at position 0, used once a component type has been
    /// recognized from it.
    pub fn remove_first(&mut self) -> Option<(String, OptionValue)> {
        self.entries.shift_remove_index(0)
    }

    /// Removes `key` if it holds a string value.
    pub fn take_str(&mut self, key: &str) -> Option<String> {
        if !matches!(self.entries.get(key), Some(OptionValue::Str(_))) {
            return None;
        }
        match self.remove(key) {
            Some(OptionValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Removes `rotate=`, `xscale=` and `yscale=` entries and derives the
    /// placement transform. A lone negative `xscale` is how the editor
    /// writes a flip, so it implies a -180 rotation with both axes negated;
    /// a lone `yscale` mirrors without rotating. When an explicit rotation
    /// accompanies a single scale axis, the rotation alone is kept.
    pub fn take_transform(&mut self) -> (Option<f64>, Option<Scale>) {
        let rotate: Option<f64> = self.take_str("rotate").and_then(|v| v.trim().parse().ok());
        let xscale: Option<f64> = self.take_str("xscale").and_then(|v| v.trim().parse().ok());
        let yscale: Option<f64> = self.take_str("yscale").and_then(|v| v.trim().parse().ok());
        match (xscale, yscale, rotate) {
            (Some(x), Some(y), Some(r)) => (Some(r), Some(Scale { x, y })),
            (Some(x), None, None) => (Some(-180.0), Some(Scale { x: -x, y: -x })),
            (None, Some(y), None) => (None, Some(Scale { x: -y, y })),
            (Some(x), Some(y), None) => (None, Some(Scale { x, y })),
            (_, _, rotate) => (rotate, None),
        }
    }

    /// Removes an `l=` / `l_=` label entry and normalizes its text.
    pub fn take_label(&mut self) -> Option<String> {
        for key in ["l", "l_"] {
            if let Some(value) = self.take_str(key) {
                let text = normalize_label(value.trim());
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_owned());
                }
            }
        }
        None
    }
}

/// Collapses the `\\` line-break marker to `\n`; everything else, math
/// included, stays verbatim. A `\\` inside `$...$` is a TeX alignment break
/// and is kept.
pub(crate) fn normalize_label(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut math = false;
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some('\\') => {
                    chars.next();
                    if math {
                        out.push_str("\\\\");
                    } else {
                        out.push('\n');
                    }
                }
                Some(&next) => {
                    out.push('\\');
                    out.push(next);
                    chars.next();
                }
                None => out.push('\\'),
            }
        } else {
            if ch == '$' {
                math = !math;
            }
            out.push(ch);
        }
    }
    out
}

/// Splits `s` on `sep` at nesting depth zero, ignoring separators inside
/// braces, brackets, math and after a backslash.
fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut brace = 0usize;
    let mut bracket = 0usize;
    let mut math = false;
    let mut escape = false;
    let mut start = 0usize;
    for (i, ch) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '$' => math = !math,
            _ if math => {}
            '{' => brace += 1,
            '}' => brace = brace.saturating_sub(1),
            '[' => bracket += 1,
            ']' => bracket = bracket.saturating_sub(1),
            c if c == sep && brace == 0 && bracket == 0 => {
                parts.push(&s[start..i]);
                start = i + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Splits one option entry on its first top-level `=`.
fn split_key_value(part: &str) -> Option<(&str, &str)> {
    let mut brace = 0usize;
    let mut math = false;
    let mut escape = false;
    for (i, ch) in part.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '$' => math = !math,
            _ if math => {}
            '{' => brace += 1,
            '}' => brace = brace.saturating_sub(1),
            '=' if brace == 0 => return Some((&part[..i], &part[i + 1..])),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn parses_flags_and_values() {
        let set = OptionSet::parse("[cute inductor, l_={$L_1$}, rotate=90]");
        assert_eq!(set.first_key(), Some("cute inductor"));
        assert_eq!(set.get("cute inductor"), Some(&OptionValue::Flag));
        assert_eq!(set.str_value("l_"), Some("$L_1$"));
        assert_eq!(set.str_value("rotate"), Some("90"));
    }

    #[test]
    fn math_protects_commas() {
        let set = OptionSet::parse("[american voltage source, l={$e(t), a(t)$}]");
        assert_eq!(set.len(), 2);
        assert_eq!(set.str_value("l"), Some("$e(t), a(t)$"));
    }

    #[test]
    fn braced_value_with_top_level_commas_is_a_list() {
        let set = OptionSet::parse("[fill={rgb,255:red,0;green,0;blue,160}]");
        let Some(OptionValue::List(items)) = set.get("fill") else {
            panic!("expected a list value");
        };
        assert_eq!(items[0], "rgb");
    }

    #[test]
    fn duplicate_keys_take_the_last_value() {
        let set = OptionSet::parse("[color=red, color=blue]");
        assert_eq!(set.len(), 1);
        assert_eq!(set.str_value("color"), Some("blue"));
    }

    #[rstest]
    #[case("[R, l=$R_1$]", Some("$R_1$"))]
    #[case("[R, l_={$R_2$}]", Some("$R_2$"))]
    #[case("[R]", None)]
    fn label_extraction(#[case] block: &str, #[case] expected: Option<&str>) {
        let mut set = OptionSet::parse(block);
        assert_eq!(set.take_label().as_deref(), expected);
    }

    #[rstest]
    #[case("[rotate=-45]", Some(-45.0), None)]
    #[case("[xscale=-1]", Some(-180.0), Some(Scale { x: 1.0, y: 1.0 }))]
    #[case("[yscale=-1]", None, Some(Scale { x: 1.0, y: -1.0 }))]
    #[case("[xscale=0.5, yscale=0.5]", None, Some(Scale { x: 0.5, y: 0.5 }))]
    #[case(
        "[xscale=-1, yscale=-1, rotate=-180]",
        Some(-180.0),
        Some(Scale { x: -1.0, y: -1.0 })
    )]
    #[case("[xscale=-1, rotate=90]", Some(90.0), None)]
    #[case("[thick]", None, None)]
    fn transform_derivation(
        #[case] block: &str,
        #[case] rotation: Option<f64>,
        #[case] scale: Option<Scale>,
    ) {
        let mut set = OptionSet::parse(block);
        assert_eq!(set.take_transform(), (rotation, scale));
        assert!(!set.contains("rotate"));
        assert!(!set.contains("xscale"));
        assert!(!set.contains("yscale"));
    }

    #[rstest]
    #[case("a \\\\ b", "a \n b")]
    #[case("$a \\\\ b$", "$a \\\\ b$")]
    #[case("$R_1$", "$R_1$")]
    #[case("\\small $e_t$", "\\small $e_t$")]
    fn label_normalization(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalize_label(input), expected);
    }
}
