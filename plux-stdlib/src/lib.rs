//! Bundled builtin-function scripts for plux.
//!
//! This crate holds the static `function name -> stdlib script` table a
//! [`plux_core::loader::ScriptLoader`] implementation consults when a
//! `[call NAME ...]` doesn't resolve against a script's own function
//! table. Each builtin is a tiny, self-contained `.plux` source bundled
//! via `include_str!`, following the pattern other crates in this
//! workspace use for embedding static text assets; none of it is
//! parsed here; that's `plux-parser`'s job, wired in by the binary
//! crate that owns both dependencies.
//!
//! `PLUX_STDLIB_PATH` lets an operator point the runtime at an external
//! directory of same-named files instead, overriding this bundle one
//! name at a time; that precedence lives in the binary crate, not here.

use std::sync::LazyLock;

use indexmap::IndexMap;

/// Name, bundled source text for every builtin function this crate
/// ships. Adding an entry here is the only step needed to register a
/// new builtin: the name is exactly what scripts call via `[call NAME
/// ...]`, and the source is expected to declare a `[function NAME
/// ...]` block of the same name.
const BUNDLED: &[(&str, &str)] = &[
    ("wait_for_prompt", include_str!("scripts/wait_for_prompt.plux")),
    (
        "send_and_wait_prompt",
        include_str!("scripts/send_and_wait_prompt.plux"),
    ),
    ("assert_exit_code", include_str!("scripts/assert_exit_code.plux")),
    ("ctrl_c", include_str!("scripts/ctrl_c.plux")),
];

static TABLE: LazyLock<IndexMap<&'static str, &'static str>> =
    LazyLock::new(|| BUNDLED.iter().copied().collect());

/// Returns the bundled script source registered under `name`, if any.
///
/// The returned text is a complete `.plux` source (`[doc]`...`[enddoc]`
/// followed by a `[function name ...] ... [endfunction]` block) ready
/// to be parsed by `plux-parser`.
pub fn builtin_source(name: &str) -> Option<&'static str> {
    TABLE.get(name).copied()
}

/// Iterates over every bundled builtin's name, in registration order.
pub fn builtin_names() -> impl Iterator<Item = &'static str> {
    TABLE.keys().copied()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{builtin_names, builtin_source};

    #[test]
    fn every_bundled_builtin_declares_its_own_function() {
        for name in builtin_names() {
            let source = builtin_source(name).expect("builtin listed in names() must have source");
            assert!(
                source.contains(&format!("[function {name}")),
                "builtin '{name}' source does not declare a matching [function {name} ...] block"
            );
        }
    }

    #[test]
    fn unknown_name_resolves_to_none() {
        assert_eq!(builtin_source("not_a_real_builtin"), None);
    }

    #[test]
    fn table_has_the_expected_builtins() {
        let names: Vec<_> = builtin_names().collect();
        assert_eq!(
            names,
            vec!["wait_for_prompt", "send_and_wait_prompt", "assert_exit_code", "ctrl_c"]
        );
    }
}
