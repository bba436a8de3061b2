//! POSIX-extended regex matching with a `\d \D \s \S \w \W` transform
//! layer, backed by `fancy_regex`.

use crate::error::Error;

/// A compiled, case-sensitive, multiline-by-default regex used for both
/// match lines and error patterns.
#[derive(Debug, Clone)]
pub struct Regex {
    source: String,
}

impl Regex {
    /// Compiles `pattern`, applying the POSIX-class transform first.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformed pattern fails to compile.
    pub fn new(pattern: &str) -> Result<Self, Error> {
        let transformed = transform(pattern);
        // Validate eagerly so callers get a ScriptError/ShellException at
        // the point the pattern is set, not at first use.
        compile(transformed.clone())?;
        Ok(Self { source: transformed })
    }

    /// The (transformed) source pattern, e.g. for logging.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` and the capture groups (1-indexed, contiguous) if
    /// `text` contains a match anywhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern fails to (re)compile.
    pub fn search<'t>(&self, text: &'t str) -> Result<Option<Vec<Option<&'t str>>>, Error> {
        let re = compile(self.source.clone())?;
        let Some(captures) = re.captures(text)? else {
            return Ok(None);
        };

        let mut groups = Vec::with_capacity(captures.len().saturating_sub(1));
        for i in 1..captures.len() {
            groups.push(captures.get(i).map(|m| m.as_str()));
        }
        Ok(Some(groups))
    }

    /// Whether the pattern, as written, is anchored to end-of-string with
    /// a trailing unescaped `$`. Used to suppress matching against a
    /// partial (not-yet-newline-terminated) buffer tail.
    pub fn is_end_anchored(&self) -> bool {
        let bytes = self.source.as_bytes();
        let Some(&last) = bytes.last() else {
            return false;
        };
        if last != b'$' {
            return false;
        }
        // Not anchored if the '$' itself is escaped.
        let mut backslashes = 0;
        for &b in bytes[..bytes.len() - 1].iter().rev() {
            if b == b'\\' {
                backslashes += 1;
            } else {
                break;
            }
        }
        backslashes % 2 == 0
    }
}

#[cached::proc_macro::cached(size = 64, result = true)]
fn compile(pattern: String) -> Result<fancy_regex::Regex, fancy_regex::Error> {
    fancy_regex::RegexBuilder::new(&pattern).build()
}

/// Adds POSIX-class equivalents for `\d \D \s \S \w \W`, group-aware so
/// existing user-written bracket expressions are respected.
fn transform(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_escape = false;
    let mut in_group: i32 = 0;

    while let Some(c) = chars.next() {
        if in_escape {
            in_escape = false;
            match c {
                'd' => transform_add_group(&mut out, in_group, "0-9", false),
                'D' => transform_add_group(&mut out, in_group, "0-9", true),
                's' => transform_add_group(&mut out, in_group, " \\n\\r\\t", false),
                'S' => transform_add_group(&mut out, in_group, " \\n\\r\\t", true),
                'w' => transform_add_group(&mut out, in_group, "A-Za-z0-9_", false),
                'W' => transform_add_group(&mut out, in_group, "A-Za-z0-9_", true),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
            continue;
        }

        match c {
            '\\' => in_escape = true,
            '[' => {
                in_group += 1;
                out.push(c);
            }
            ']' => {
                in_group = (in_group - 1).max(0);
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    out
}

/// When inside an existing bracket expression, splice the class body in
/// directly (negation becomes `^` right after `[`); otherwise wrap it in
/// its own `[...]`/`[^...]`.
fn transform_add_group(out: &mut String, in_group: i32, body: &str, negate: bool) {
    if in_group > 0 {
        if negate {
            out.push('^');
        }
        out.push_str(body);
    } else if negate {
        out.push('[');
        out.push('^');
        out.push_str(body);
        out.push(']');
    } else {
        out.push('[');
        out.push_str(body);
        out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn digit_class_matches_digits_only() {
        let re = Regex::new(r"\d+").unwrap();
        assert!(re.search("abc123").unwrap().is_some());
        assert!(re.search("abc").unwrap().is_none());
    }

    #[test]
    fn negated_digit_class_excludes_digits() {
        let re = Regex::new(r"^\D+$").unwrap();
        assert!(re.search("abc").unwrap().is_some());
        assert!(re.search("abc1").unwrap().is_none());
    }

    #[test]
    fn whitespace_class_inside_existing_group_is_spliced() {
        let re = Regex::new(r"[a\s]+").unwrap();
        assert!(re.search("a a").unwrap().is_some());
    }

    #[test]
    fn captures_are_returned_in_order() {
        let re = Regex::new(r"hello ([a-z]+) and ([0-9]+)!").unwrap();
        let groups = re.search("hello world and 2021!").unwrap().unwrap();
        assert_eq!(groups, vec![Some("world"), Some("2021")]);
    }

    #[test]
    fn end_anchor_detection() {
        assert!(Regex::new("foo$").unwrap().is_end_anchored());
        assert!(!Regex::new("foo").unwrap().is_end_anchored());
        assert!(!Regex::new(r"foo\$").unwrap().is_end_anchored());
    }

    #[test]
    fn invalid_pattern_is_rejected_at_construction() {
        assert!(Regex::new("(unterminated").is_err());
    }
}
