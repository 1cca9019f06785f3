//! Slices a drawing body into statements.
//!
//! A statement ends at a `;` found outside every brace, bracket, paren and
//! math region. Scope markers (`\begin{scope}`, `\end{scope}`) carry no `;`
//! in the dialect, so the splitter emits each marker, together with its
//! optional option block, as a statement of its own.

/// One statement sliced out of the drawing body. `offset` is the byte
/// position of the first non-whitespace character in the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawStatement<'a> {
    pub text: &'a str,
    pub offset: usize,
}

/// Blanks out `%` comments (up to end of line). An escaped `\%` stays.
///
/// Comment bytes are replaced with spaces rather than removed so that byte
/// offsets reported in diagnostics keep pointing into the original body.
pub fn strip_comments(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut in_comment = false;
    let mut escape = false;
    for ch in body.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push('\n');
            } else {
                for _ in 0..ch.len_utf8() {
                    out.push(' ');
                }
            }
            continue;
        }
        if escape {
            escape = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escape = true;
                out.push(ch);
            }
            '%' => {
                in_comment = true;
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Splits the body into statements, respecting nesting so that a `;` inside
/// an option value or a label never ends a statement.
///
/// An unterminated `[` or `(` must not swallow the rest of the body, so a
/// `;` under bracket or paren depth still ends the statement when the next
/// non-whitespace is a `\` command or the end of input. The broken statement
/// then fails on its own in the scanner. Brace depth gets no such recovery;
/// a `;` inside braces may be label text.
pub fn split_statements(body: &str) -> Vec<RawStatement<'_>> {
    let mut statements = Vec::new();
    let mut depths = [0usize; 3]; // braces, brackets, parens
    let mut math = false;
    let mut escape = false;
    let mut start = 0usize;
    let mut i = 0usize;
    while i < body.len() {
        let rest = &body[i..];
        if !math && depths == [0, 0, 0] && body[start..i].trim().is_empty() {
            if let Some(len) = scope_marker_len(rest) {
                push_trimmed(&mut statements, body, i, i + len);
                i += len;
                start = i;
                continue;
            }
        }
        let Some(ch) = rest.chars().next() else { break };
        let len = ch.len_utf8();
        if escape {
            escape = false;
            i += len;
            continue;
        }
        match ch {
            '\\' => escape = true,
            '$' => math = !math,
            _ if math => {}
            '{' => depths[0] += 1,
            '}' => depths[0] = depths[0].saturating_sub(1),
            '[' => depths[1] += 1,
            ']' => depths[1] = depths[1].saturating_sub(1),
            '(' => depths[2] += 1,
            ')' => depths[2] = depths[2].saturating_sub(1),
            ';' if depths == [0, 0, 0] => {
                push_trimmed(&mut statements, body, start, i + 1);
                start = i + 1;
            }
            ';' if depths[0] == 0 && statement_break_ahead(&rest[1..]) => {
                push_trimmed(&mut statements, body, start, i + 1);
                depths = [0, 0, 0];
                start = i + 1;
            }
            _ => {}
        }
        i += len;
    }
    push_trimmed(&mut statements, body, start, body.len());
    statements
}

/// True when only whitespace separates this point from the next `\` command
/// or the end of the body.
fn statement_break_ahead(rest: &str) -> bool {
    let rest = rest.trim_start();
    rest.is_empty() || rest.starts_with('\\')
}

fn push_trimmed<'a>(statements: &mut Vec<RawStatement<'a>>, body: &'a str, start: usize, end: usize) {
    let raw = &body[start..end];
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    let offset = start + (raw.len() - raw.trim_start().len());
    statements.push(RawStatement { text: trimmed, offset });
}

/// Length of a scope marker at the head of `rest`, including the option
/// block directly after a `\begin{scope}`.
fn scope_marker_len(rest: &str) -> Option<usize> {
    const BEGIN: &str = r"\begin{scope}";
    const END: &str = r"\end{scope}";
    if let Some(after) = rest.strip_prefix(BEGIN) {
        let mut len = BEGIN.len();
        let ws: usize = after
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .map(char::len_utf8)
            .sum();
        if after[ws..].starts_with('[') {
            if let Some(block) = balanced_block_len(&after[ws..]) {
                len += ws + block;
            }
        }
        return Some(len);
    }
    if rest.starts_with(END) {
        return Some(END.len());
    }
    None
}

/// Byte length of the `[...]` block at the head of `s`, or `None` if it
/// never closes. Braces and math inside the block do not end it.
fn balanced_block_len(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut brace = 0usize;
    let mut math = false;
    let mut escape = false;
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
            '[' if brace == 0 => depth += 1,
            ']' if brace == 0 => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[rstest]
    #[case("\\draw (0,0) -- (1,0);", vec!["\\draw (0,0) -- (1,0);"])]
    #[case(
        "\\draw (0,0) -- (1,0);\n\\node (A) at (2,0) {x};",
        vec!["\\draw (0,0) -- (1,0);", "\\node (A) at (2,0) {x};"]
    )]
    #[case("\\node at (0,0) {a;b};", vec!["\\node at (0,0) {a;b};"])]
    #[case("\\draw (0,0) to[l={a;b}] (1,0);", vec!["\\draw (0,0) to[l={a;b}] (1,0);"])]
    fn splits_on_top_level_semicolons(#[case] body: &str, #[case] expected: Vec<&str>) {
        let texts: Vec<&str> = split_statements(body).iter().map(|s| s.text).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn scope_markers_become_statements() {
        let body = "\\begin{scope}[name=left]\n\\node at (0,0) {};\n\\end{scope}";
        let texts: Vec<&str> = split_statements(body).iter().map(|s| s.text).collect();
        assert_eq!(
            texts,
            vec!["\\begin{scope}[name=left]", "\\node at (0,0) {};", "\\end{scope}"]
        );
    }

    #[test]
    fn offsets_point_into_the_body() {
        let body = "  \\draw (0,0) -- (1,0);\n  \\draw (1,0) -- (2,0);";
        let statements = split_statements(body);
        assert_eq!(statements.len(), 2);
        for statement in &statements {
            assert_eq!(&body[statement.offset..statement.offset + 5], "\\draw");
        }
    }

    #[test]
    fn unterminated_bracket_is_confined_to_its_statement() {
        let body = "\\draw (0,0) to[R (2,0);\n\\draw (0,0) -- (1,0);\n\\frobnicate;";
        let texts: Vec<&str> = split_statements(body).iter().map(|s| s.text).collect();
        assert_eq!(
            texts,
            vec![
                "\\draw (0,0) to[R (2,0);",
                "\\draw (0,0) -- (1,0);",
                "\\frobnicate;"
            ]
        );
    }

    #[test]
    fn recovery_does_not_split_inside_braces() {
        // A label may legitimately contain `; \command`.
        let body = "\\node at (0,0) {a; \\small b};";
        let statements = split_statements(body);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn comments_are_blanked_not_removed() {
        let body = "\\draw (0,0) % wire to the right\n-- (1,0);";
        let stripped = strip_comments(body);
        assert_eq!(stripped.len(), body.len());
        assert!(!stripped.contains("wire"));
        let statements = split_statements(&stripped);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn escaped_percent_is_kept() {
        let stripped = strip_comments("\\node at (0,0) {100\\%};");
        assert!(stripped.contains("\\%"));
    }
}
