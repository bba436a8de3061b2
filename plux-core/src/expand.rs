//! `$NAME` / `${NAME}` / `${=NAME}` text expansion against a [`VarStore`].

use crate::error::Error;
use crate::variables::VarStore;

/// POSIX ERE metacharacters that `${=NAME}` escapes in the substituted
/// value.
const ERE_SPECIAL: &[char] = &['(', ')', '[', ']', '{', '}', '?', '*', '|', '.'];

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Expands `$NAME`, `${NAME}`, `$$`, and `${=NAME}` references in `text`
/// against `shell`'s view of `env`.
///
/// # Errors
///
/// Returns [`Error`] if a `$NAME`/`${NAME}` reference is empty, an
/// `${...}` is unterminated, or a referenced variable is undefined in
/// every scope.
pub fn expand(env: &VarStore, shell: &str, text: &str) -> Result<String, Error> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }

        match chars.peek().copied() {
            None => {
                // Trailing lone '$' at end of input is literal.
                out.push('$');
            }
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some('{') => {
                chars.next();
                let escape = chars.peek() == Some(&'=');
                if escape {
                    chars.next();
                }

                let mut name = String::new();
                let mut terminated = false;
                for ch in chars.by_ref() {
                    if ch == '}' {
                        terminated = true;
                        break;
                    }
                    name.push(ch);
                }
                if !terminated {
                    return Err(Error::script(
                        crate::sourceinfo::SourceInfo::new("<expand>", 0),
                        format!("unterminated '${{' in '{text}'"),
                    ));
                }

                let value = lookup(env, shell, &name)?;
                if escape {
                    push_escaped(&mut out, value);
                } else {
                    out.push_str(value);
                }
            }
            Some(first) if is_name_char(first) => {
                let mut name = String::new();
                while let Some(&ch) = chars.peek() {
                    if is_name_char(ch) {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = lookup(env, shell, &name)?;
                out.push_str(value);
            }
            Some(_) => {
                return Err(Error::script(
                    crate::sourceinfo::SourceInfo::new("<expand>", 0),
                    format!("empty variable name in '{text}'"),
                ));
            }
        }
    }

    Ok(out)
}

fn lookup<'a>(env: &'a VarStore, shell: &str, name: &str) -> Result<&'a str, Error> {
    env.get(shell, name)
        .ok_or_else(|| Error::undefined_variable(shell, name))
}

/// Backslash-escapes POSIX ERE metacharacters in `value` for safe
/// insertion into a regex. A backslash already present in `value`
/// disables escaping of the character that follows it, so an
/// already-escaped value is never double-escaped.
fn push_escaped(out: &mut String, value: &str) {
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(c);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            continue;
        }
        if ERE_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::VarScope;
    use pretty_assertions::assert_eq;

    fn store_with(pairs: &[(&str, &str)]) -> VarStore {
        let mut store = VarStore::from_process_env();
        for (k, v) in pairs {
            store.set(VarScope::Global, "", *k, *v).unwrap();
        }
        store
    }

    #[test]
    fn expands_bare_name() {
        let store = store_with(&[("NAME", "world")]);
        assert_eq!(expand(&store, "s1", "hello $NAME").unwrap(), "hello world");
    }

    #[test]
    fn expands_braced_name() {
        let store = store_with(&[("NAME", "world")]);
        assert_eq!(
            expand(&store, "s1", "hello ${NAME}!").unwrap(),
            "hello world!"
        );
    }

    #[test]
    fn double_dollar_is_literal() {
        let store = store_with(&[]);
        assert_eq!(expand(&store, "s1", "$$5").unwrap(), "$5");
    }

    #[test]
    fn trailing_dollar_is_literal() {
        let store = store_with(&[]);
        assert_eq!(expand(&store, "s1", "cost: $").unwrap(), "cost: $");
    }

    #[test]
    fn unterminated_brace_is_a_fault() {
        let store = store_with(&[]);
        assert!(expand(&store, "s1", "${NAME").is_err());
    }

    #[test]
    fn undefined_variable_is_a_fault() {
        let store = store_with(&[]);
        assert!(expand(&store, "s1", "$MISSING").is_err());
    }

    #[test]
    fn regex_escape_modifier_escapes_ere_metacharacters() {
        let store = store_with(&[("V", "a.b(c)")]);
        assert_eq!(
            expand(&store, "s1", "${=V}").unwrap(),
            "a\\.b\\(c\\)"
        );
    }

    #[test]
    fn regex_escape_modifier_leaves_pre_escaped_chars_alone() {
        let store = store_with(&[("V", r"a\.b(c)")]);
        assert_eq!(expand(&store, "s1", "${=V}").unwrap(), r"a\.b\(c\)");
    }

    #[test]
    fn expansion_is_not_recursive() {
        let store = store_with(&[("A", "$B"), ("B", "should-not-appear")]);
        assert_eq!(expand(&store, "s1", "$A").unwrap(), "$B");
    }
}
