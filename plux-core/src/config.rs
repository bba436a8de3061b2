//! Runtime configuration: log/stdlib directories and defaults that the
//! CLI frontend resolves once and hands to the [`crate::runner::Runner`].
//!
//! A handful of resolved paths and knobs, no behavior of its own.

use std::path::PathBuf;

use crate::timing::DEFAULT_TIMEOUT_MS;

/// Environment variable overriding the compiled-in stdlib directory.
pub const STDLIB_PATH_ENV: &str = "PLUX_STDLIB_PATH";

/// Directory (relative to the process CWD) persisted logs are written
/// under.
pub const DEFAULT_LOG_DIR: &str = "plux";

/// Resolved runtime configuration for one `plux` invocation.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory persisted per-shell input/output logs are written under.
    pub log_dir: PathBuf,
    /// Directory holding stdlib include scripts on disk, if overridden via
    /// [`STDLIB_PATH_ENV`]. `None` means "use the embedded bundle".
    pub stdlib_dir: Option<PathBuf>,
    /// Default per-shell timeout in milliseconds, absent a `[timeout N]`
    /// override.
    pub default_timeout_ms: u64,
    /// Mirror shell input to stderr as it is sent (`-t`/`--tail`).
    pub tail: bool,
}

impl Config {
    /// Resolves configuration from the process environment and CLI flags.
    ///
    /// `timeout_override_ms`, when `Some`, replaces [`DEFAULT_TIMEOUT_MS`].
    pub fn resolve(timeout_override_ms: Option<u64>, tail: bool) -> Self {
        let stdlib_dir = std::env::var_os(STDLIB_PATH_ENV).map(PathBuf::from);
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            stdlib_dir,
            default_timeout_ms: timeout_override_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
            tail,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_uses_default_timeout() {
        let cfg = Config::default();
        assert_eq!(cfg.default_timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(!cfg.tail);
    }

    #[test]
    fn timeout_override_replaces_default() {
        let cfg = Config::resolve(Some(5_000), true);
        assert_eq!(cfg.default_timeout_ms, 5_000);
        assert!(cfg.tail);
    }
}
