//! Line-oriented state machine that turns script text into a
//! [`plux_core::ast::Script`].
//!
//! States mirror the four sections a script can be written in: `[doc]`
//! text, headers (`[config]`/`[include]`/`[global]`/`[function]`), the
//! body (one or more `[shell NAME]`/`[process NAME cmd arg...]`
//! sections), and `[cleanup]`. A script may skip straight from headers
//! to cleanup with no body if it declares no shell at all.

use std::fs;
use std::path::Path;

use plux_core::ast::{self, Function, Line, LineKind, Script, ScriptEnv};
use plux_core::error::{Error, ParseError};
use plux_core::sourceinfo::SourceInfo;

use crate::tokenize;

/// Parses the file at `path` into a [`Script`], registering any
/// `[function]` blocks it declares into `env`.
///
/// # Errors
///
/// Returns [`Error`] if the file cannot be read, or [`ParseError`]
/// (wrapped in [`Error`]) if it fails to parse.
pub fn parse_file(path: &Path, env: ScriptEnv) -> Result<Script, Error> {
    let text = fs::read_to_string(path)?;
    parse_str(path, &text, env)
}

/// Parses `text`, attributed to `path` for diagnostics, into a
/// [`Script`], registering any `[function]` blocks it declares into
/// `env`.
///
/// # Errors
///
/// Returns [`ParseError`] (wrapped in [`Error`]) on any malformed
/// directive or line command.
pub fn parse_str(path: &Path, text: &str, env: ScriptEnv) -> Result<Script, Error> {
    let mut script = Script::new(path.to_path_buf(), env);
    let mut lines = LineSource::new(text);
    let mut state = State::Begin;
    let mut doc_buf = String::new();
    let mut active_shell = String::new();

    while let Some((raw, lineno)) = lines.next() {
        let body = raw.trim_start();
        let info = SourceInfo::new(path.to_path_buf(), lineno);

        match state {
            State::Begin => {
                if body != "[doc]" {
                    return Err(ParseError::new(info, body, "expected [doc] at the start of a script").into());
                }
                state = State::Doc;
            }

            State::Doc => {
                if body == "[enddoc]" {
                    script.doc = doc_buf.trim_end_matches('\n').to_string();
                    state = State::Headers;
                } else if body.starts_with('[') {
                    return Err(ParseError::new(info, body, "unexpected directive, expected [enddoc]").into());
                } else {
                    doc_buf.push_str(raw);
                    doc_buf.push('\n');
                }
            }

            State::Headers => {
                if let Some(switch) = parse_shell_switch(body, &info)? {
                    apply_switch(&mut script, switch, &mut active_shell);
                    state = State::Shell;
                } else if body.starts_with("[function ") {
                    let fun = parse_function(&mut lines, path, body, &info)?;
                    script.env.set_function(fun);
                } else {
                    let line = parse_header_cmd(body, &info)?;
                    script.headers.push(line);
                }
            }

            State::Shell => {
                if let Some(switch) = parse_shell_switch(body, &info)? {
                    apply_switch(&mut script, switch, &mut active_shell);
                } else if body == "[cleanup]" {
                    active_shell = ast::CLEANUP_SHELL.to_string();
                    state = State::Cleanup;
                } else if body.starts_with("[function ") {
                    let fun = parse_function(&mut lines, path, body, &info)?;
                    script.env.set_function(fun);
                } else {
                    let line = parse_line_cmd(body, &info, &active_shell)?;
                    script.body.push(line);
                }
            }

            State::Cleanup => {
                if body.starts_with("[function ") {
                    let fun = parse_function(&mut lines, path, body, &info)?;
                    script.env.set_function(fun);
                } else {
                    let line = parse_line_cmd(body, &info, &active_shell)?;
                    script.cleanup.push(line);
                }
            }
        }
    }

    Ok(script)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Begin,
    Doc,
    Headers,
    Shell,
    Cleanup,
}

enum ShellSwitch {
    Shell(String),
    Process(String, Vec<String>),
}

fn apply_switch(script: &mut Script, switch: ShellSwitch, active_shell: &mut String) {
    match switch {
        ShellSwitch::Shell(name) => *active_shell = name,
        ShellSwitch::Process(name, argv) => {
            script.process_defs.insert(name.clone(), argv);
            *active_shell = name;
        }
    }
}

/// Recognizes `[shell NAME]` and `[process NAME cmd arg...]`, the two
/// directives that open (or re-open) a shell section. Returns `Ok(None)`
/// if `body` is neither.
fn parse_shell_switch(body: &str, info: &SourceInfo) -> Result<Option<ShellSwitch>, Error> {
    if let Some(rest) = body.strip_prefix("[shell ") {
        let Some(name) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[shell ...] directive missing closing ]").into());
        };
        let name = name.trim();
        validate_shell_name(name, info, body)?;
        return Ok(Some(ShellSwitch::Shell(name.to_string())));
    }

    if let Some(rest) = body.strip_prefix("[process ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[process ...] directive missing closing ]").into());
        };
        let tokens =
            tokenize::split_args(inner).map_err(|reason| ParseError::new(info.clone(), body, reason))?;
        let mut tokens = tokens.into_iter();
        let Some(name) = tokens.next() else {
            return Err(ParseError::new(info.clone(), body, "[process ...] requires a name and command").into());
        };
        validate_shell_name(&name, info, body)?;
        let argv: Vec<String> = tokens.collect();
        if argv.is_empty() {
            return Err(ParseError::new(info.clone(), body, "[process ...] requires a command").into());
        }
        return Ok(Some(ShellSwitch::Process(name, argv)));
    }

    Ok(None)
}

fn validate_shell_name(name: &str, info: &SourceInfo, body: &str) -> Result<(), Error> {
    let unprefixed = name.strip_prefix('$').unwrap_or(name);
    let valid = !unprefixed.is_empty()
        && unprefixed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid || name == ast::CLEANUP_SHELL {
        return Err(ParseError::new(
            info.clone(),
            body,
            format!("invalid shell name '{name}': only letters, digits, '_', '-', and a leading '$' are allowed"),
        )
        .into());
    }
    Ok(())
}

fn parse_header_cmd(body: &str, info: &SourceInfo) -> Result<Line, Error> {
    if let Some(rest) = body.strip_prefix("[include ") {
        let Some(path) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[include ...] directive missing closing ]").into());
        };
        return Ok(Line::new(info.clone(), "", LineKind::HeaderInclude {
            path: path.trim().to_string(),
        }));
    }

    if let Some(rest) = body.strip_prefix("[config ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[config ...] directive missing closing ]").into());
        };
        return parse_config(inner, info, body);
    }

    if let Some(rest) = body.strip_prefix("[global ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[global ...] directive missing closing ]").into());
        };
        let (key, val) = parse_var_assign(inner, info, body)?;
        return Ok(Line::new(info.clone(), "", LineKind::AssignGlobal { key, val }));
    }

    Err(ParseError::new(info.clone(), body, "unexpected content in script headers").into())
}

fn parse_config(inner: &str, info: &SourceInfo, body: &str) -> Result<Line, Error> {
    let (sub, rest) = split_first_word(inner);
    match sub {
        "require" => {
            let (key, val) = match rest.split_once('=') {
                Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
                None => (rest.trim().to_string(), None),
            };
            if key.is_empty() {
                return Err(ParseError::new(info.clone(), body, "[config require ...] is missing a key").into());
            }
            Ok(Line::new(info.clone(), "", LineKind::HeaderRequire { key, val }))
        }
        "set" => {
            let Some((key, val)) = rest.split_once('=') else {
                return Err(ParseError::new(info.clone(), body, "[config set ...] is missing '='").into());
            };
            Ok(Line::new(info.clone(), "", LineKind::HeaderSet {
                key: key.trim().to_string(),
                val: val.trim().to_string(),
            }))
        }
        other => Err(ParseError::new(
            info.clone(),
            body,
            format!("unsupported [config {other} ...] directive, expected require or set"),
        )
        .into()),
    }
}

fn parse_line_cmd(body: &str, info: &SourceInfo, shell: &str) -> Result<Line, Error> {
    if let Some(rest) = body.strip_prefix('!') {
        return Ok(Line::new(info.clone(), shell, LineKind::SendOutput {
            text: rest.to_string(),
        }));
    }

    if let Some(after_one) = body.strip_prefix('?') {
        let kind = if let Some(after_two) = after_one.strip_prefix('?') {
            if let Some(after_three) = after_two.strip_prefix('?') {
                // Exactly 3 leading '?'s mark a literal match; any beyond
                // the third belong to the pattern itself.
                LineKind::MatchExact { pattern: after_three.to_string() }
            } else {
                LineKind::MatchVar { pattern: after_two.to_string() }
            }
        } else {
            LineKind::MatchRegex { pattern: after_one.to_string() }
        };
        return Ok(Line::new(info.clone(), shell, kind));
    }

    if let Some(rest) = body.strip_prefix('-') {
        return Ok(Line::new(info.clone(), shell, LineKind::SetErrorPattern {
            pattern: rest.to_string(),
        }));
    }

    if body.starts_with('[') {
        return parse_bracket_line_cmd(body, info, shell);
    }

    Err(ParseError::new(info.clone(), body, "unexpected content, not a recognized line command").into())
}

fn parse_bracket_line_cmd(body: &str, info: &SourceInfo, shell: &str) -> Result<Line, Error> {
    if let Some(rest) = body.strip_prefix("[global ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[global ...] directive missing closing ]").into());
        };
        let (key, val) = parse_var_assign(inner, info, body)?;
        return Ok(Line::new(info.clone(), shell, LineKind::AssignGlobal { key, val }));
    }

    if let Some(rest) = body.strip_prefix("[local ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[local ...] directive missing closing ]").into());
        };
        let (key, val) = parse_var_assign(inner, info, body)?;
        return Ok(Line::new(info.clone(), shell, LineKind::AssignShell { key, val }));
    }

    if body == "[timeout]" {
        return Ok(Line::new(info.clone(), shell, LineKind::Timeout { timeout_ms: 0 }));
    }

    if let Some(rest) = body.strip_prefix("[timeout ") {
        let Some(num_str) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[timeout ...] directive missing closing ]").into());
        };
        let secs: u64 = num_str
            .trim()
            .parse()
            .map_err(|_err| ParseError::new(info.clone(), body, "invalid [timeout N], N must be a non-negative integer of seconds"))?;
        return Ok(Line::new(info.clone(), shell, LineKind::Timeout {
            timeout_ms: secs.saturating_mul(1000),
        }));
    }

    if let Some(rest) = body.strip_prefix("[call ") {
        let Some(inner) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[call ...] directive missing closing ]").into());
        };
        let (name, rest) = split_first_word(inner);
        if name.is_empty() {
            return Err(ParseError::new(info.clone(), body, "[call ...] requires a function name").into());
        }
        let args = if rest.is_empty() {
            Vec::new()
        } else {
            tokenize::split_args(rest).map_err(|reason| ParseError::new(info.clone(), body, reason))?
        };
        return Ok(Line::new(info.clone(), shell, LineKind::Call {
            name: name.to_string(),
            args,
        }));
    }

    if let Some(rest) = body.strip_prefix("[progress ") {
        let Some(text) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[progress ...] directive missing closing ]").into());
        };
        return Ok(Line::new(info.clone(), shell, LineKind::Progress {
            text: text.to_string(),
        }));
    }

    if let Some(rest) = body.strip_prefix("[log ") {
        let Some(text) = rest.strip_suffix(']') else {
            return Err(ParseError::new(info.clone(), body, "[log ...] directive missing closing ]").into());
        };
        return Ok(Line::new(info.clone(), shell, LineKind::Log {
            text: text.to_string(),
        }));
    }

    Err(ParseError::new(info.clone(), body, "unsupported directive").into())
}

fn parse_var_assign(inner: &str, info: &SourceInfo, body: &str) -> Result<(String, String), Error> {
    inner.split_once('=').map_or_else(
        || Err(ParseError::new(info.clone(), body, "missing '=' in variable assignment").into()),
        |(k, v)| Ok((k.to_string(), v.to_string())),
    )
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    s.find(char::is_whitespace).map_or((s, ""), |idx| {
        let (word, rest) = s.split_at(idx);
        (word, rest.trim_start())
    })
}

/// Parses a `[function NAME arg1 arg2 ...] ... [endfunction]` block,
/// consuming lines from `lines` until the terminator.
///
/// Only `[shell NAME]` switches are recognized inside a function body
/// (matching the source language this is derived from); a `[process
/// ...]` registration inside a function is rejected, since
/// `process_defs` lives on the enclosing [`Script`], not the function.
fn parse_function(
    lines: &mut LineSource<'_>,
    path: &Path,
    header_body: &str,
    header_info: &SourceInfo,
) -> Result<Function, Error> {
    let Some(rest) = header_body.strip_prefix("[function ") else {
        return Err(ParseError::new(header_info.clone(), header_body, "malformed [function ...] directive").into());
    };
    let Some(inner) = rest.strip_suffix(']') else {
        return Err(ParseError::new(header_info.clone(), header_body, "[function ...] directive missing closing ]").into());
    };
    let (name, rest) = split_first_word(inner);
    if name.is_empty() {
        return Err(ParseError::new(header_info.clone(), header_body, "[function ...] requires a name").into());
    }
    let param_names = if rest.is_empty() {
        Vec::new()
    } else {
        tokenize::split_args(rest)
            .map_err(|reason| ParseError::new(header_info.clone(), header_body, reason))?
    };

    let mut body = Vec::new();
    let mut active_shell = String::new();

    loop {
        let Some((raw, lineno)) = lines.next() else {
            return Err(ParseError::new(
                header_info.clone(),
                header_body,
                "reached end of file while scanning for [endfunction]",
            )
            .into());
        };
        let line_body = raw.trim_start();
        let line_info = SourceInfo::new(path.to_path_buf(), lineno);

        if line_body == "[endfunction]" {
            break;
        }

        if let Some(switch) = parse_shell_switch(line_body, &line_info)? {
            match switch {
                ShellSwitch::Shell(name) => active_shell = name,
                ShellSwitch::Process(..) => {
                    return Err(ParseError::new(
                        line_info,
                        line_body,
                        "[process ...] is not supported inside a function body",
                    )
                    .into());
                }
            }
            continue;
        }

        let line = parse_line_cmd(line_body, &line_info, &active_shell)?;
        body.push(line);
    }

    Ok(Function {
        info: header_info.clone(),
        name: name.to_string(),
        param_names,
        body,
    })
}

/// Iterates over the non-blank, non-comment lines of a script, pairing
/// each with its 1-based line number. Leading whitespace is kept on
/// (directive parsers strip it themselves); trailing whitespace is
/// preserved verbatim since `!text`/`?pat`/... payloads are taken from
/// the raw line, not a trimmed copy.
struct LineSource<'a> {
    lines: std::str::Lines<'a>,
    lineno: u32,
}

impl<'a> LineSource<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            lineno: 0,
        }
    }

    fn next(&mut self) -> Option<(&'a str, u32)> {
        loop {
            let raw = self.lines.next()?;
            self.lineno += 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            return Some((raw, self.lineno));
        }
    }
}
