//! Script-loading seam the [`crate::runner::Runner`] calls into for
//! `[include path]` directives and builtin-function resolution, without
//! `plux-core` depending on the parser crate that sits above it.
//!
//! `plux-parser` depends on `plux-core` (for [`crate::ast`] and
//! [`crate::error`]), so the Runner cannot call the parser directly
//! without an import cycle. The composition root (the `plux` binary)
//! supplies a concrete [`ScriptLoader`] wiring `plux-parser` and
//! `plux-stdlib` together; the Runner only ever sees this trait.

use std::path::Path;

use crate::ast::{Script, ScriptEnv};
use crate::error::Error;

/// Parses script text and resolves builtin-function names to bundled
/// include scripts.
pub trait ScriptLoader: std::fmt::Debug {
    /// Parses the file at `path`, registering any `[function]` blocks it
    /// declares into `env`.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the file cannot be read or fails to parse.
    fn load_file(&self, path: &Path, env: ScriptEnv) -> Result<Script, Error>;

    /// Parses the bundled stdlib script registered under `name`, if any,
    /// registering its functions into `env`. Returns `Ok(None)` if `name`
    /// is not a known builtin.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the builtin source fails to parse.
    fn load_builtin(&self, name: &str, env: ScriptEnv) -> Result<Option<Script>, Error>;
}
