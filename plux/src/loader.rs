//! Composition-root [`ScriptLoader`] wiring `plux-parser` and
//! `plux-stdlib` together.
//!
//! `plux-core` cannot depend on either crate without creating an import
//! cycle (`plux-parser` depends on `plux-core`), so this binary is
//! where the two halves meet.

use std::path::{Path, PathBuf};

use plux_core::ast::{Script, ScriptEnv};
use plux_core::error::Error;
use plux_core::loader::ScriptLoader;

/// Parses files with `plux-parser`; resolves builtin function names
/// against an on-disk override directory (`PLUX_STDLIB_PATH`) before
/// falling back to the bundle embedded in `plux-stdlib`.
#[derive(Clone, Debug, Default)]
pub struct PluxScriptLoader {
    stdlib_dir: Option<PathBuf>,
}

impl PluxScriptLoader {
    /// Creates a loader that consults `stdlib_dir` before the bundled
    /// stdlib, when set.
    pub const fn new(stdlib_dir: Option<PathBuf>) -> Self {
        Self { stdlib_dir }
    }
}

impl ScriptLoader for PluxScriptLoader {
    fn load_file(&self, path: &Path, env: ScriptEnv) -> Result<Script, Error> {
        plux_parser::parse_file(path, env)
    }

    fn load_builtin(&self, name: &str, env: ScriptEnv) -> Result<Option<Script>, Error> {
        if let Some(dir) = &self.stdlib_dir {
            let candidate = dir.join(format!("{name}.plux"));
            if candidate.is_file() {
                return plux_parser::parse_file(&candidate, env).map(Some);
            }
        }

        let Some(source) = plux_stdlib::builtin_source(name) else {
            return Ok(None);
        };
        let virtual_path = PathBuf::from(format!("<builtin:{name}>"));
        plux_parser::parse_str(&virtual_path, source, env).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use plux_core::ast::ScriptEnv;

    use super::PluxScriptLoader;

    #[test]
    fn resolves_bundled_builtin_by_name() {
        let loader = PluxScriptLoader::new(None);
        let env = ScriptEnv::new();
        loader
            .load_builtin("wait_for_prompt", env.clone())
            .expect("bundled builtin should parse")
            .expect("wait_for_prompt is a known builtin");
        assert!(env.get_function("wait_for_prompt").is_some());
    }

    #[test]
    fn unknown_builtin_resolves_to_none() {
        let loader = PluxScriptLoader::new(None);
        let result = loader
            .load_builtin("not_a_builtin", ScriptEnv::new())
            .expect("lookup itself should not fail");
        assert!(result.is_none());
    }
}
