//! The three-layer variable environment shared by every shell in a run.

use indexmap::IndexMap;

/// Which scope a write targets, or a read started its search from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarScope {
    /// The top-of-stack function scope. Writing with an empty function
    /// stack is a caller error.
    Function,
    /// The per-shell-name scope, visible across all function calls on
    /// that shell.
    Shell,
    /// The single script-global scope.
    Global,
}

type EnvMap = IndexMap<String, String>;

/// One function-call frame: per-shell (and shell="") variable bindings
/// pushed on entry and dropped on return.
#[derive(Debug, Default, Clone)]
struct FunctionFrame {
    /// Keyed by shell name ("" included), each holding its own map.
    by_shell: IndexMap<String, EnvMap>,
}

/// The three-layer (plus OS-env and builtin-default) variable store.
///
/// Lookup order: function (shell-qualified, then "") → shell → global →
/// os → builtin-defaults. Writes target exactly one named scope.
#[derive(Debug)]
pub struct VarStore {
    os: EnvMap,
    global: EnvMap,
    shell: IndexMap<String, EnvMap>,
    function: Vec<FunctionFrame>,
    defaults: EnvMap,
}

/// Forced OS-environment overrides, applied after inheriting the real
/// process environment, so scripts can rely on a known prompt string.
pub(crate) const FORCED_OS_ENV: &[(&str, &str)] = &[("ENV", "/dev/null"), ("PS1", "SH-PROMPT:")];

impl VarStore {
    /// Builds a fresh store, seeding `os` from the current process
    /// environment (plus the two forced overrides) and `defaults` with the
    /// static builtin constants.
    pub fn from_process_env() -> Self {
        let mut os: EnvMap = std::env::vars().collect();
        for (key, val) in FORCED_OS_ENV {
            os.insert((*key).to_string(), (*val).to_string());
        }

        let mut defaults = EnvMap::new();
        defaults.insert("_TAB_".to_string(), "\t".to_string());
        defaults.insert("_CTRL_C_".to_string(), "\u{3}".to_string());
        defaults.insert("_COLOR_RESET_".to_string(), "\u{1b}[0m".to_string());
        defaults.insert("_COLOR_RED_".to_string(), "\u{1b}[31m".to_string());
        defaults.insert("_COLOR_GREEN_".to_string(), "\u{1b}[32m".to_string());
        defaults.insert("_COLOR_YELLOW_".to_string(), "\u{1b}[33m".to_string());

        Self {
            os,
            global: EnvMap::new(),
            shell: IndexMap::new(),
            function: Vec::new(),
            defaults,
        }
    }

    /// Resolves `key` under `shell`, walking function (shell-qualified,
    /// then "") → shell → global → os → builtin-defaults.
    pub fn get(&self, shell: &str, key: &str) -> Option<&str> {
        if let Some(frame) = self.function.last() {
            if let Some(val) = frame.by_shell.get(shell).and_then(|m| m.get(key)) {
                return Some(val.as_str());
            }
            if !shell.is_empty() {
                if let Some(val) = frame.by_shell.get("").and_then(|m| m.get(key)) {
                    return Some(val.as_str());
                }
            }
        }

        if let Some(val) = self.shell.get(shell).and_then(|m| m.get(key)) {
            return Some(val.as_str());
        }

        if let Some(val) = self.global.get(key) {
            return Some(val.as_str());
        }

        if let Some(val) = self.os.get(key) {
            return Some(val.as_str());
        }

        self.defaults.get(key).map(String::as_str)
    }

    /// Writes `key = value` into exactly one scope.
    ///
    /// # Errors
    ///
    /// Returns an error if `scope` is [`VarScope::Function`] and no
    /// function frame is currently pushed.
    pub fn set(
        &mut self,
        scope: VarScope,
        shell: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), crate::error::Error> {
        let key = key.into();
        let value = value.into();
        match scope {
            VarScope::Function => {
                let frame = self.function.last_mut().ok_or_else(|| {
                    crate::error::ErrorKind::Script {
                        info: crate::sourceinfo::SourceInfo::new("<runtime>", 0),
                        message: "cannot write function-scoped variable with no active function"
                            .to_string(),
                    }
                })?;
                frame
                    .by_shell
                    .entry(shell.to_string())
                    .or_default()
                    .insert(key, value);
            }
            VarScope::Shell => {
                self.shell
                    .entry(shell.to_string())
                    .or_default()
                    .insert(key, value);
            }
            VarScope::Global => {
                self.global.insert(key, value);
            }
        }
        Ok(())
    }

    /// Pushes a fresh, empty function scope (called on function entry).
    pub fn push_function(&mut self) {
        self.function.push(FunctionFrame::default());
    }

    /// Pops the top function scope, dropping all its bindings (called on
    /// function return).
    pub fn pop_function(&mut self) {
        self.function.pop();
    }

    /// Current function-call stack depth; used to assert balance at the
    /// end of a run.
    pub fn function_depth(&self) -> usize {
        self.function.len()
    }

    /// Iterates the raw process-environment entries (used to seed a
    /// spawned child's environment).
    pub fn os_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.os.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn os_env_carries_forced_overrides() {
        let store = VarStore::from_process_env();
        assert_eq!(store.get("s1", "ENV"), Some("/dev/null"));
        assert_eq!(store.get("s1", "PS1"), Some("SH-PROMPT:"));
    }

    #[test]
    fn builtin_defaults_are_visible_when_nothing_shadows_them() {
        let store = VarStore::from_process_env();
        assert_eq!(store.get("s1", "_TAB_"), Some("\t"));
    }

    #[test]
    fn shell_scope_shadows_global_and_os() {
        let mut store = VarStore::from_process_env();
        store.set(VarScope::Global, "", "X", "global").unwrap();
        store.set(VarScope::Shell, "s1", "X", "shell").unwrap();
        assert_eq!(store.get("s1", "X"), Some("shell"));
        assert_eq!(store.get("s2", "X"), Some("global"));
    }

    #[test]
    fn function_scope_shadows_everything_and_pops_cleanly() {
        let mut store = VarStore::from_process_env();
        store.set(VarScope::Global, "", "who", "nobody").unwrap();
        store.push_function();
        store.set(VarScope::Function, "", "who", "world").unwrap();
        assert_eq!(store.get("s1", "who"), Some("world"));
        store.pop_function();
        assert_eq!(store.get("s1", "who"), Some("nobody"));
    }

    #[test]
    fn writing_function_scope_without_a_frame_is_an_error() {
        let mut store = VarStore::from_process_env();
        assert!(store.set(VarScope::Function, "", "x", "y").is_err());
    }

    #[test]
    fn function_depth_tracks_push_pop_balance() {
        let mut store = VarStore::from_process_env();
        assert_eq!(store.function_depth(), 0);
        store.push_function();
        assert_eq!(store.function_depth(), 1);
        store.pop_function();
        assert_eq!(store.function_depth(), 0);
    }
}
