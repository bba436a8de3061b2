//! Backslash-escape handling for `!text` (`SendOutput`) lines.
//!
//! Only `\n \t \r` are recognized; any other escaped character is passed
//! through literally (the backslash is dropped), matching the narrow
//! unescape contract `SendOutput` requires rather than full shell-style
//! escape expansion.

/// Expands `\n`, `\t`, `\r` escapes in `text`; any other `\X` becomes `X`.
pub fn unescape_send_output(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn expands_known_escapes() {
        assert_eq!(unescape_send_output(r"a\nb\tc\rd"), "a\nb\tc\rd");
    }

    #[test]
    fn unknown_escape_passes_through_literally() {
        assert_eq!(unescape_send_output(r"a\$b"), "a$b");
    }

    #[test]
    fn trailing_backslash_is_kept() {
        assert_eq!(unescape_send_output(r"a\"), "a\\");
    }
}
