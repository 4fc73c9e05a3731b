//! Search value escaping (FHIR "Encoding Note").
//!
//! FHIR search values may escape separator characters with `\`:
//! - `\,` (comma inside a single OR value)
//! - `\|` (token system/code and quantity separator)
//! - `\$` (composite component separator)
//! - `\\` (literal backslash)
//!
//! Splitting keeps escape sequences intact so every level of the grammar can
//! split on its own separator; [`unescape`] is applied once, to leaf values.

/// Splits `input` on every `sep` that is not preceded by an escaping `\`.
pub(crate) fn split_unescaped(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;
    let bytes = input.as_bytes();
    while i < bytes.len() {
        match bytes[i] as char {
            '\\' => {
                i += 1;
                if i < bytes.len() {
                    i += 1;
                }
            }
            c if c == sep => {
                out.push(&input[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    out.push(&input[start..]);
    out
}

/// Resolves escape sequences in a leaf value.
///
/// Returns `None` for a dangling backslash or an escape of any other character.
pub(crate) fn unescape(input: &str) -> Option<String> {
    if !input.contains('\\') {
        return Some(input.to_string());
    }
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            next @ ('\\' | ',' | '$' | '|') => out.push(next),
            _ => return None,
        }
    }
    Some(out)
}
