//! Renders a parsed [`Script`] as text for `-d`/`--dump`.
//!
//! Each line is rendered through [`OutputFormat`], the same
//! `%type[name]` substitution helper the execution engine exposes for
//! its own diagnostics, rather than a one-off `format!` per line kind.

use plux_core::ast::{Line, LineKind, Script};
use plux_core::output_format::OutputFormat;

const LINE_TEMPLATE: &str = "%s[0]  [%s[1]]  %s[2] %s[3]";

/// Renders `script`'s documentation, headers, body, cleanup section,
/// and `[process]` registrations as plain text, one rendered line per
/// parsed [`Line`].
pub fn render_script(script: &Script) -> String {
    let mut out = String::new();

    if !script.doc.is_empty() {
        out.push_str("# doc\n");
        out.push_str(&script.doc);
        out.push('\n');
    }

    render_section(&mut out, "headers", &script.headers);
    render_section(&mut out, "body", &script.body);
    render_section(&mut out, "cleanup", &script.cleanup);

    if !script.process_defs.is_empty() {
        out.push_str("# process_defs\n");
        for (name, argv) in &script.process_defs {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&argv.join(" "));
            out.push('\n');
        }
    }

    out
}

fn render_section(out: &mut String, title: &str, lines: &[Line]) {
    if lines.is_empty() {
        return;
    }
    out.push_str("# ");
    out.push_str(title);
    out.push('\n');
    for line in lines {
        out.push_str(&render_line(line));
        out.push('\n');
    }
}

fn render_line(line: &Line) -> String {
    let (kind, payload) = describe(&line.kind);
    let args = [line.info.to_string(), line.shell.clone(), kind.to_string(), payload];
    OutputFormat::new(LINE_TEMPLATE, &args)
        .format()
        .unwrap_or_else(|err| format!("<dump error: {err}>"))
}

fn describe(kind: &LineKind) -> (&'static str, String) {
    match kind {
        LineKind::HeaderRequire { key, val } => (
            "require",
            val.as_ref().map_or_else(|| key.clone(), |v| format!("{key}={v}")),
        ),
        LineKind::HeaderSet { key, val } => ("set", format!("{key}={val}")),
        LineKind::HeaderInclude { path } => ("include", path.clone()),
        LineKind::AssignGlobal { key, val } => ("global", format!("{key}={val}")),
        LineKind::AssignShell { key, val } => ("local", format!("{key}={val}")),
        LineKind::SendOutput { text } => ("send", text.clone()),
        LineKind::MatchExact { pattern } => ("match_exact", pattern.clone()),
        LineKind::MatchVar { pattern } => ("match_var", pattern.clone()),
        LineKind::MatchRegex { pattern } => ("match_regex", pattern.clone()),
        LineKind::SetErrorPattern { pattern } => ("error_pattern", pattern.clone()),
        LineKind::Timeout { timeout_ms } => ("timeout", timeout_ms.to_string()),
        LineKind::Call { name, args } => ("call", format!("{name}({})", args.join(", "))),
        LineKind::Progress { text } => ("progress", text.clone()),
        LineKind::Log { text } => ("log", text.clone()),
    }
}

#[cfg(test)]
mod tests {
    use plux_core::ast::ScriptEnv;
    use std::path::Path;

    use super::render_script;

    #[test]
    fn renders_doc_and_body() {
        let script =
            plux_parser::parse_str(Path::new("t.plux"), "[doc]\nhello\n[enddoc]\n[shell sh]\n!echo hi\n", ScriptEnv::new())
                .expect("script should parse");
        let dump = render_script(&script);
        assert!(dump.contains("# doc"));
        assert!(dump.contains("hello"));
        assert!(dump.contains("send echo hi"));
    }

    #[test]
    fn empty_sections_are_omitted() {
        let script = plux_parser::parse_str(Path::new("t.plux"), "[doc]\n[enddoc]\n", ScriptEnv::new())
            .expect("script should parse");
        let dump = render_script(&script);
        assert!(!dump.contains("# headers"));
        assert!(!dump.contains("# body"));
    }
}
