//! Character-indexed string helpers.
//!
//! Lines are stored as `String`s but every column in the public API counts `char`s, so the
//! conversions between the two live here.

/// Number of `char`s in `s`.
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte offset of character `column`, clamped to the end of the string.
pub(crate) fn byte_index(s: &str, column: usize) -> usize {
    s.char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Substring between two character columns. Both ends are clamped and reversed ends yield "".
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    let a = byte_index(s, start);
    let b = byte_index(s, end);
    if a >= b { "" } else { &s[a..b] }
}

/// Everything from character `column` on.
pub(crate) fn char_tail(s: &str, column: usize) -> &str {
    &s[byte_index(s, column)..]
}

/// Everything before character `column`.
pub(crate) fn char_head(s: &str, column: usize) -> &str {
    &s[..byte_index(s, column)]
}

/// Split on any of `\r\n`, `\r` or `\n`.
///
/// Trailing empty segments are kept: N line breaks always produce N+1 lines.
pub(crate) fn split_lines_preserve_trailing(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    lines.push(current);
    lines
}

/// Leading whitespace (spaces and tabs) of a line.
pub(crate) fn leading_whitespace(line: &str) -> &str {
    let end = line
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(line.len());
    &line[..end]
}
