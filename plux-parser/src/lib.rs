//! Parser for plux's expect-style scripting language.
//!
//! Turns script text into the [`plux_core::ast::Script`] model the
//! execution engine runs: a line-oriented state machine (see
//! [`parser`]) over a small quote-aware tokenizer (see [`tokenize`])
//! used for `[process]`/`[call]`/`[function]` argument lists.
//!
//! This crate depends on `plux-core` but not the other way around;
//! `plux-core::loader::ScriptLoader` is the seam a composition root
//! (the `plux` binary) uses to wire this parser in without creating an
//! import cycle.

mod parser;
mod tokenize;

pub use parser::{parse_file, parse_str};

#[cfg(test)]
mod tests {
    use plux_core::ast::{LineKind, ScriptEnv};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    use super::parse_str;

    fn parse(text: &str) -> plux_core::ast::Script {
        parse_str(Path::new("test.plux"), text, ScriptEnv::new()).expect("script should parse")
    }

    #[test]
    fn parses_doc_and_require_header() {
        let script = parse(
            "[doc]\nexercise the parser\n[enddoc]\n[config require PATH]\n[shell sh]\n!echo hi\n",
        );
        assert_eq!(script.doc, "exercise the parser");
        assert_eq!(script.headers.len(), 1);
        assert!(matches!(
            script.headers[0].kind,
            LineKind::HeaderRequire { ref key, val: None } if key == "PATH"
        ));
        assert_eq!(script.body.len(), 1);
        assert_eq!(script.body[0].shell, "sh");
    }

    #[test]
    fn parses_match_markers() {
        let script = parse("[doc]\n[enddoc]\n[shell sh]\n?re\n??lit\n???exact\n");
        assert!(matches!(script.body[0].kind, LineKind::MatchRegex { .. }));
        assert!(matches!(script.body[1].kind, LineKind::MatchVar { .. }));
        assert!(matches!(script.body[2].kind, LineKind::MatchExact { .. }));
    }

    #[test]
    fn parses_process_registration_and_switches_shell() {
        let script = parse("[doc]\n[enddoc]\n[process worker /bin/cat]\n!hello\n");
        assert_eq!(
            script.process_defs.get("worker").map(Vec::as_slice),
            Some(["/bin/cat".to_string()].as_slice())
        );
        assert_eq!(script.body[0].shell, "worker");
    }

    #[test]
    fn parses_function_and_call() {
        let script = parse(
            "[doc]\n[enddoc]\n[function greet name]\n[shell sh]\n!echo $name\n[endfunction]\n[shell sh]\n[call greet world]\n",
        );
        let fun = script.env.get_function("greet").expect("function registered");
        assert_eq!(fun.param_names, vec!["name".to_string()]);
        assert_eq!(fun.body.len(), 1);
        assert!(matches!(
            script.body[0].kind,
            LineKind::Call { ref name, ref args } if name == "greet" && args == &["world".to_string()]
        ));
    }

    #[test]
    fn cleanup_runs_under_the_cleanup_shell() {
        let script = parse("[doc]\n[enddoc]\n[shell sh]\n!echo hi\n[cleanup]\n!echo bye\n");
        assert_eq!(script.cleanup[0].shell, plux_core::ast::CLEANUP_SHELL);
    }

    #[test]
    fn rejects_missing_doc_header() {
        let err = super::parse_str(Path::new("t.plux"), "[shell sh]\n", ScriptEnv::new());
        assert!(err.is_err());
    }

    #[test]
    fn rejects_invalid_shell_name() {
        let err = super::parse_str(
            Path::new("t.plux"),
            "[doc]\n[enddoc]\n[shell bad name]\n",
            ScriptEnv::new(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_unterminated_function() {
        let err = super::parse_str(
            Path::new("t.plux"),
            "[doc]\n[enddoc]\n[function f]\n[shell sh]\n!hi\n",
            ScriptEnv::new(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn rejects_reserved_cleanup_shell_name() {
        let err = super::parse_str(
            Path::new("t.plux"),
            "[doc]\n[enddoc]\n[shell cleanup]\n",
            ScriptEnv::new(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn parses_timeout_and_error_pattern() {
        let script = parse("[doc]\n[enddoc]\n[shell sh]\n[timeout 5]\n-err.*\n-\n");
        assert!(matches!(
            script.body[0].kind,
            LineKind::Timeout { timeout_ms: 5000 }
        ));
        assert!(matches!(script.body[1].kind, LineKind::SetErrorPattern { ref pattern } if pattern == "err.*"));
        assert!(matches!(script.body[2].kind, LineKind::SetErrorPattern { ref pattern } if pattern.is_empty()));
    }

    #[test]
    fn parses_include_and_config_set() {
        let script = parse("[doc]\n[enddoc]\n[include common.plux]\n[config set FOO=bar]\n[shell sh]\n!hi\n");
        assert!(matches!(
            script.headers[0].kind,
            LineKind::HeaderInclude { ref path } if path == "common.plux"
        ));
        assert!(matches!(
            script.headers[1].kind,
            LineKind::HeaderSet { ref key, ref val } if key == "FOO" && val == "bar"
        ));
    }
}
