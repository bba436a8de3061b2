//! `%type[name]` format-string expansion, used by the CLI's dump helpers
//! to render a parsed model with argument substitution.
//!
//! A tiny state machine over `%type[name]`, where `name` is either an
//! argument index or `len(index)`, and `type` selects how the looked-up
//! argument is rendered (`s` verbatim, `b` as `true`/`false`, the integer
//! types as their native-endian byte representation).

use std::fmt::Write as _;

/// Expands `%type[name]` references in a format string against a fixed
/// argument list.
#[derive(Debug)]
pub struct OutputFormat<'a> {
    str: &'a str,
    args: &'a [String],
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    None,
    Type,
    Name,
}

impl<'a> OutputFormat<'a> {
    /// Builds a formatter over `str`, substituting from `args`.
    pub fn new(str: &'a str, args: &'a [String]) -> Self {
        Self { str, args }
    }

    /// Expands every `%type[name]` reference in the format string.
    ///
    /// # Errors
    ///
    /// Returns a human-readable message on an incomplete `%type[name]`, an
    /// unknown type or function, an out-of-range argument index, or a
    /// value that fails to parse for the requested integer type.
    pub fn format(&self) -> Result<String, String> {
        let mut formatted = String::with_capacity(self.str.len());
        let mut state = State::None;
        let mut ty = String::new();
        let mut name = String::new();

        let chars: Vec<char> = self.str.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            match state {
                State::Type => {
                    if c == '[' {
                        state = State::Name;
                    } else {
                        ty.push(c);
                    }
                }
                State::Name => {
                    if c == ']' {
                        self.expand(&mut formatted, &ty, &name)?;
                        state = State::None;
                        ty.clear();
                        name.clear();
                    } else {
                        name.push(c);
                    }
                }
                State::None => {
                    if c == '%' && chars.get(i + 1) == Some(&'%') {
                        formatted.push('%');
                        i += 1;
                    } else if c == '%' {
                        state = State::Type;
                    } else {
                        formatted.push(c);
                    }
                }
            }
            i += 1;
        }

        if state != State::None {
            return Err("incomplete format".to_string());
        }
        Ok(formatted)
    }

    fn expand(&self, formatted: &mut String, ty: &str, name: &str) -> Result<(), String> {
        if ty.is_empty() {
            return Err("format type is empty".to_string());
        }
        if name.is_empty() {
            return Err(format!("format name/index is empty for {ty}"));
        }

        let var = self.eval_var(name)?;
        match ty {
            "i8" => write_int_bytes::<i8>(formatted, &var),
            "i16" => write_int_bytes::<i16>(formatted, &var),
            "i32" => write_int_bytes::<i32>(formatted, &var),
            "i64" => write_int_bytes::<i64>(formatted, &var),
            "u8" => write_uint_bytes::<u8>(formatted, &var),
            "u16" => write_uint_bytes::<u16>(formatted, &var),
            "u32" => write_uint_bytes::<u32>(formatted, &var),
            "u64" => write_uint_bytes::<u64>(formatted, &var),
            "b" => {
                if var.is_empty() || var == "0" || var == "false" {
                    formatted.push_str("false");
                } else {
                    formatted.push_str("true");
                }
                Ok(())
            }
            "s" => {
                formatted.push_str(&var);
                Ok(())
            }
            other => Err(format!("unsupported type {other}")),
        }
    }

    fn eval_var(&self, name: &str) -> Result<String, String> {
        let Some(open) = name.find('(') else {
            return self.get_arg_by_index_str(name);
        };
        if !name.ends_with(')') {
            return Err(format!("invalid function {name}, missing end )"));
        }

        let fun = &name[..open];
        let arg = &name[open + 1..name.len() - 1];
        match fun {
            "len" => {
                let val = self.get_arg_by_index_str(arg)?;
                Ok(val.chars().count().to_string())
            }
            other => Err(format!("unknown function {other}")),
        }
    }

    fn get_arg_by_index_str(&self, idx_str: &str) -> Result<String, String> {
        let idx: usize = idx_str
            .parse()
            .map_err(|_| format!("{idx_str} is not a valid argument index"))?;
        self.args
            .get(idx)
            .cloned()
            .ok_or_else(|| format!("argument {idx} missing"))
    }
}

fn write_int_bytes<T>(formatted: &mut String, str: &str) -> Result<(), String>
where
    T: TryFrom<i64> + Copy,
    T::Error: std::fmt::Debug,
{
    let parsed: i64 = str.parse().map_err(|_| format!("invalid integer: {str}"))?;
    let val: T = T::try_from(parsed).map_err(|_| format!("invalid integer: {str}"))?;
    push_hex_bytes(formatted, bytes_of(&val));
    Ok(())
}

fn write_uint_bytes<T>(formatted: &mut String, str: &str) -> Result<(), String>
where
    T: TryFrom<u64> + Copy,
    T::Error: std::fmt::Debug,
{
    let parsed: u64 = str.parse().map_err(|_| format!("invalid unsigned integer: {str}"))?;
    let val: T = T::try_from(parsed).map_err(|_| format!("invalid unsigned integer: {str}"))?;
    push_hex_bytes(formatted, bytes_of(&val));
    Ok(())
}

/// Byte view of `val` in native endianness, mirroring the original
/// implementation's `reinterpret_cast<char*>`.
fn bytes_of<T: Copy>(val: &T) -> &[u8] {
    let ptr = std::ptr::from_ref(val).cast::<u8>();
    // SAFETY: `ptr` points at a live `T` of exactly `size_of::<T>()` bytes.
    unsafe { std::slice::from_raw_parts(ptr, std::mem::size_of::<T>()) }
}

/// Dump output renders raw integer bytes as hex rather than embedding
/// non-UTF8 bytes in the formatted `String`.
fn push_hex_bytes(formatted: &mut String, bytes: &[u8]) {
    for byte in bytes {
        let _ = write!(formatted, "{byte:02x}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn verbatim_percent_is_literal() {
        let fmt = OutputFormat::new("100%%", &[]);
        assert_eq!(fmt.format().unwrap(), "100%");
    }

    #[test]
    fn string_type_substitutes_argument() {
        let args = vec!["hello".to_string()];
        let fmt = OutputFormat::new("say %s[0]!", &args);
        assert_eq!(fmt.format().unwrap(), "say hello!");
    }

    #[test]
    fn len_function_reports_char_count() {
        let args = vec!["hello".to_string()];
        let fmt = OutputFormat::new("%s[len(0)]", &args);
        assert_eq!(fmt.format().unwrap(), "5");
    }

    #[test]
    fn bool_type_normalizes_falsy_values() {
        let args = vec!["0".to_string(), "1".to_string()];
        let fmt = OutputFormat::new("%b[0] %b[1]", &args);
        assert_eq!(fmt.format().unwrap(), "false true");
    }

    #[test]
    fn u8_type_renders_one_hex_byte() {
        let args = vec!["255".to_string()];
        let fmt = OutputFormat::new("%u8[0]", &args);
        assert_eq!(fmt.format().unwrap(), "ff");
    }

    #[test]
    fn missing_closing_bracket_is_incomplete() {
        let fmt = OutputFormat::new("%s[0", &[]);
        assert!(fmt.format().is_err());
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let fmt = OutputFormat::new("%s[3]", &[]);
        assert!(fmt.format().is_err());
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let args = vec!["x".to_string()];
        let fmt = OutputFormat::new("%q[0]", &args);
        assert!(fmt.format().is_err());
    }
}
