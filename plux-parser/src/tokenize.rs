//! Whitespace tokenizer for `[process]`/`[call]`/`[function]` argument
//! lists: quote-aware, backslash-escaping, and strict — an unterminated
//! quote or a trailing backslash is an error rather than being swallowed
//! silently.

/// Splits `text` into whitespace-delimited tokens.
///
/// A token may be wrapped in single or double quotes (no distinction is
/// made between the two once inside); a backslash escapes the character
/// that follows it, including a quote or another backslash, and is
/// dropped from the resulting token. Quoting lets a token contain
/// whitespace; it does not nest.
///
/// # Errors
///
/// Returns a human-readable reason if a quote is left unterminated or
/// the text ends on a trailing unescaped backslash.
pub fn split_args(text: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    'outer: loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        let mut quote: Option<char> = None;
        loop {
            let Some(c) = chars.next() else {
                if let Some(q) = quote {
                    return Err(format!("unterminated {q} quote"));
                }
                tokens.push(token);
                break 'outer;
            };

            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (None, '"' | '\'') => quote = Some(c),
                (_, '\\') => match chars.next() {
                    Some(escaped) => token.push(escaped),
                    None => return Err("trailing backslash".to_string()),
                },
                (None, c) if c.is_whitespace() => break,
                (_, c) => token.push(c),
            }
        }

        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::split_args;

    #[test]
    fn splits_plain_whitespace() {
        assert_eq!(split_args("a b   c").unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn keeps_quoted_whitespace_together() {
        assert_eq!(
            split_args(r#"echo "hello world" done"#).unwrap(),
            vec!["echo", "hello world", "done"]
        );
    }

    #[test]
    fn single_and_double_quotes_are_interchangeable() {
        assert_eq!(split_args("'a b' \"c d\"").unwrap(), vec!["a b", "c d"]);
    }

    #[test]
    fn backslash_escapes_next_char() {
        assert_eq!(split_args(r"a\ b c").unwrap(), vec!["a b", "c"]);
        assert_eq!(split_args(r#"a\"b"#).unwrap(), vec![r#"a"b"#]);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert_eq!(split_args("   ").unwrap(), Vec::<String>::new());
        assert_eq!(split_args("").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(split_args("a 'b c").is_err());
    }

    #[test]
    fn trailing_backslash_is_an_error() {
        assert!(split_args(r"a\").is_err());
    }

    #[test]
    fn last_token_ends_at_end_of_input_with_no_trailing_whitespace() {
        assert_eq!(split_args("greet world").unwrap(), vec!["greet", "world"]);
        assert_eq!(split_args("\"quoted tail\"").unwrap(), vec!["quoted tail"]);
    }
}
