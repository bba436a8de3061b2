//! Structured outcomes returned by lines, functions, and whole script
//! runs.

use itertools::Itertools as _;

use crate::sourceinfo::SourceInfo;

/// The status a single `line.run(...)` call can return.
#[derive(Clone, Debug)]
pub enum LineStatus {
    /// The line completed successfully.
    Ok,
    /// A match line found nothing to consume yet; the Runner should poll
    /// for more I/O and retry.
    NoMatch,
    /// `[call NAME arg...]` — resolve and run the named function.
    Call {
        /// Function name (already expanded).
        name: String,
        /// Arguments (already expanded).
        args: Vec<String>,
    },
    /// `[include path]` — parse and run the named file.
    Include {
        /// Path (not yet resolved against the current script's directory).
        path: String,
    },
    /// `[config set K=V]` — apply at runner level.
    Set {
        /// Key.
        key: String,
        /// Value.
        val: String,
    },
}

/// The terminal status of a whole script run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every line in headers, body, and cleanup completed.
    Ok,
    /// A line's error condition was raised (ScriptError, ShellException,
    /// Undefined*).
    Error,
    /// A match line never resolved before its shell's timeout elapsed.
    Timeout,
}

/// The full outcome of a `Runner::run(script)` call.
#[derive(Clone, Debug)]
pub struct ScriptResult {
    /// Terminal status.
    pub status: RunStatus,
    /// Source location the failure (if any) occurred at.
    pub info: Option<SourceInfo>,
    /// Human-readable error text, empty on success.
    pub error: String,
    /// Call-stack frames (function name, shell) active when the failure
    /// occurred, outermost first.
    pub stack: Vec<String>,
}

impl ScriptResult {
    /// Builds a successful result.
    pub fn ok() -> Self {
        Self {
            status: RunStatus::Ok,
            info: None,
            error: String::new(),
            stack: Vec::new(),
        }
    }

    /// Builds a failing result.
    pub fn error(
        status: RunStatus,
        info: SourceInfo,
        error: impl Into<String>,
        stack: Vec<String>,
    ) -> Self {
        Self {
            status,
            info: Some(info),
            error: error.into(),
            stack,
        }
    }

    /// Whether this result represents overall success.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, RunStatus::Ok)
    }

    /// Renders `stack` as a single `outer -> ... -> inner` line, or an
    /// empty string when the failure occurred outside any function call.
    pub fn render_stack(&self) -> String {
        self.stack.iter().join(" -> ")
    }
}
