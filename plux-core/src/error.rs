//! Error taxonomy for the plux execution engine.
//!
//! Mirrors the layered design used throughout this workspace: an opaque
//! [`Error`] wraps a non-exhaustive [`ErrorKind`], so callers can match on
//! kind without the wrapper leaking representation details.

use crate::sourceinfo::SourceInfo;

/// An error produced anywhere in the plux engine.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    /// Returns the underlying kind.
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Wraps a script-level semantic fault with its source location.
    pub fn script(info: SourceInfo, message: impl Into<String>) -> Self {
        let err = Self {
            kind: ErrorKind::Script {
                info,
                message: message.into(),
            },
        };
        tracing::error!(%err, "script error");
        err
    }

    /// Wraps an undefined-variable fault.
    pub fn undefined_variable(shell: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UndefinedVariable {
                shell: shell.into(),
                name: name.into(),
            },
        }
    }

    /// Wraps an undefined-function fault.
    pub fn undefined_function(name: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UndefinedFunction { name: name.into() },
        }
    }

    /// Wraps an argument-count mismatch on a function call.
    pub fn undefined_argument(name: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self {
            kind: ErrorKind::UndefinedArgument {
                name: name.into(),
                expected,
                actual,
            },
        }
    }

    /// Wraps a process/shell-side fault (spawn failure, error-pattern match).
    pub fn shell(shell: impl Into<String>, message: impl Into<String>) -> Self {
        let err = Self {
            kind: ErrorKind::Shell {
                shell: shell.into(),
                message: message.into(),
            },
        };
        tracing::error!(%err, "shell error");
        err
    }
}

impl<T> From<T> for Error
where
    ErrorKind: From<T>,
{
    fn from(value: T) -> Self {
        Self {
            kind: ErrorKind::from(value),
        }
    }
}

/// The full set of fault kinds the engine can raise.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A runtime semantic fault: bad regex, missing `}`, unsupported scope.
    #[error("{}:{}: {message}", info.path.display(), info.linenumber)]
    Script {
        /// Location the fault was raised at.
        info: SourceInfo,
        /// Human-readable description.
        message: String,
    },

    /// Variable lookup failed in every consulted scope.
    #[error("undefined variable '{name}'{}", shell_suffix(shell))]
    UndefinedVariable {
        /// Shell the lookup was scoped to ("" for none).
        shell: String,
        /// Variable name that failed to resolve.
        name: String,
    },

    /// `[call NAME ...]` named a function absent from the function table
    /// and the builtin table.
    #[error("undefined function '{name}'")]
    UndefinedFunction {
        /// Name that failed to resolve.
        name: String,
    },

    /// `[call NAME ...]` supplied the wrong number of arguments.
    #[error("function '{name}' expects {expected} argument(s), got {actual}")]
    UndefinedArgument {
        /// Function name.
        name: String,
        /// Declared parameter count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// A process-side fault: spawn failure, error-pattern match, invalid
    /// error-pattern regex.
    #[error("shell '{shell}': {message}")]
    Shell {
        /// Shell the fault occurred on.
        shell: String,
        /// Human-readable description.
        message: String,
    },

    /// Failure compiling a regex (match pattern or error pattern).
    #[error("invalid regex: {0}")]
    Regex(#[from] fancy_regex::Error),

    /// Underlying OS/IO failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Underlying POSIX syscall failure.
    #[cfg(unix)]
    #[error(transparent)]
    Nix(#[from] nix::Error),

    /// A script or stdlib include failed to parse, surfaced at `[call]`/
    /// `[include]` resolution time.
    #[error(transparent)]
    Parse(#[from] ParseError),
}

fn shell_suffix(shell: &str) -> String {
    if shell.is_empty() {
        String::new()
    } else {
        format!(" in shell '{shell}'")
    }
}

/// A fault raised while tokenizing or parsing a script file, before any
/// line has run. Kept distinct from [`Error`]: a parse fault has no call
/// stack and no running shell to attribute it to, just a location and a
/// reason.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{path}:{linenumber}: {reason}", path = info.path.display(), linenumber = info.linenumber)]
pub struct ParseError {
    /// Location the fault was found at.
    pub info: SourceInfo,
    /// The offending line's raw text, for diagnostics.
    pub line: String,
    /// Human-readable description of what went wrong.
    pub reason: String,
}

impl ParseError {
    /// Builds a new parse fault, logging it at construction the way
    /// [`Error::script`] does.
    pub fn new(info: SourceInfo, line: impl Into<String>, reason: impl Into<String>) -> Self {
        let err = Self {
            info,
            line: line.into(),
            reason: reason.into(),
        };
        tracing::error!(%err, "parse error");
        err
    }
}
