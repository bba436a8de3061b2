//! Parsed script entities: [`Script`], [`Function`], and the
//! discriminated [`Line`] kinds.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::sourceinfo::SourceInfo;

/// The synthetic shell name the `[cleanup]` section runs under.
pub const CLEANUP_SHELL: &str = "cleanup";

/// One parsed directive or line-command.
///
/// Each variant carries its own payload; [`Line::info`] and
/// [`Line::shell`] expose the data common to all of them (source
/// location and declared shell selector, itself subject to variable
/// expansion at run time).
#[derive(Clone, Debug)]
pub struct Line {
    /// File and line number this was parsed from.
    pub info: SourceInfo,
    /// The shell selector text as written (may itself contain `$...`).
    /// Empty string means "no shell context" (legal in headers and for
    /// function arguments).
    pub shell: String,
    /// The line's behavior and payload.
    pub kind: LineKind,
}

/// The behavior-carrying payload of a [`Line`].
#[derive(Clone, Debug)]
pub enum LineKind {
    /// `[config require KEY[=VAL]]` — header only.
    HeaderRequire {
        /// Key to look up in the OS environment.
        key: String,
        /// Optional required value; `None` means "any value is fine".
        val: Option<String>,
    },
    /// `[config set KEY=VAL]` — header only.
    HeaderSet {
        /// Key to set at script level.
        key: String,
        /// Value to set.
        val: String,
    },
    /// `[include path]` — header only.
    HeaderInclude {
        /// Path to include, resolved against the current script's directory.
        path: String,
    },
    /// `[global K=V]`.
    AssignGlobal {
        /// Variable name.
        key: String,
        /// Value expression (expanded at run time).
        val: String,
    },
    /// `[local K=V]`.
    AssignShell {
        /// Variable name.
        key: String,
        /// Value expression (expanded at run time).
        val: String,
    },
    /// `!text`.
    SendOutput {
        /// Text expression (expanded, then unescaped, at run time).
        text: String,
    },
    /// `???pat` — literal match, pattern not expanded.
    MatchExact {
        /// Raw pattern text.
        pattern: String,
    },
    /// `??pat` — variable-expanded literal match.
    MatchVar {
        /// Pattern expression (expanded at run time, then substring-matched).
        pattern: String,
    },
    /// `?pat` — regex match.
    MatchRegex {
        /// Pattern expression (expanded at run time, then regex-matched).
        pattern: String,
    },
    /// `-pat` / bare `-` (clears the error pattern when `pattern` is empty).
    SetErrorPattern {
        /// Pattern expression (expanded at run time); empty clears it.
        pattern: String,
    },
    /// `[timeout]` / `[timeout N]`.
    Timeout {
        /// Timeout in milliseconds; `0` resets to the shell default.
        timeout_ms: u64,
    },
    /// `[call NAME arg...]`.
    Call {
        /// Function name expression (expanded at run time).
        name: String,
        /// Argument expressions (each expanded at run time).
        args: Vec<String>,
    },
    /// `[progress TEXT]`.
    Progress {
        /// Text expression (expanded at run time).
        text: String,
    },
    /// `[log TEXT]`.
    Log {
        /// Text expression (expanded at run time).
        text: String,
    },
}

impl Line {
    /// Constructs a new line.
    pub fn new(info: SourceInfo, shell: impl Into<String>, kind: LineKind) -> Self {
        Self {
            info,
            shell: shell.into(),
            kind,
        }
    }
}

/// A named, parameterized sequence of lines, callable via `[call NAME
/// arg...]`. Functions are process-wide: includes may register them from
/// anywhere, and any script sharing the same [`ScriptEnv`] can call them.
#[derive(Clone, Debug)]
pub struct Function {
    /// Location of the `[function ...]` directive.
    pub info: SourceInfo,
    /// Function name.
    pub name: String,
    /// Declared parameter names, bound positionally from call arguments.
    pub param_names: Vec<String>,
    /// Body lines.
    pub body: Vec<Line>,
}

/// The process-wide function table, shared by a script and everything it
/// transitively includes.
#[derive(Clone, Default)]
pub struct ScriptEnv {
    functions: Arc<Mutex<HashMap<String, Arc<Function>>>>,
}

impl ScriptEnv {
    /// Creates a fresh, empty function table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `fun`, replacing any prior function of the same name.
    pub fn set_function(&self, fun: Function) {
        let mut functions = self.functions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        functions.insert(fun.name.clone(), Arc::new(fun));
    }

    /// Looks up a function by name.
    pub fn get_function(&self, name: &str) -> Option<Arc<Function>> {
        let functions = self.functions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        functions.get(name).cloned()
    }
}

impl std::fmt::Debug for ScriptEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let functions = self.functions.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.debug_struct("ScriptEnv")
            .field("functions", &functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A fully parsed script: headers, body, cleanup section, any
/// `[process NAME cmd arg...]` registrations, and a handle into the
/// shared [`ScriptEnv`] function table.
#[derive(Clone, Debug)]
pub struct Script {
    /// Path this script was parsed from.
    pub file: PathBuf,
    /// Script name, derived from `file`'s stem; used to name the
    /// script's per-run log directory.
    pub name: String,
    /// Documentation text captured between `[doc]` and `[enddoc]`.
    pub doc: String,
    /// Header-section lines (requires, includes, global assigns).
    pub headers: Vec<Line>,
    /// Body lines, across all `[shell NAME]` sections.
    pub body: Vec<Line>,
    /// Cleanup-section lines, always run after the body regardless of
    /// its outcome.
    pub cleanup: Vec<Line>,
    /// `name -> argv` for each `[process NAME cmd arg...]` registration.
    pub process_defs: HashMap<String, Vec<String>>,
    /// The function table this script's `[function]` directives register
    /// into, and `[call]` lines resolve against.
    pub env: ScriptEnv,
}

impl Script {
    /// Creates an empty script rooted at `file`, sharing `env`. `name` is
    /// derived from `file`'s stem, falling back to `"script"` if it has
    /// none.
    pub fn new(file: impl Into<PathBuf>, env: ScriptEnv) -> Self {
        let file = file.into();
        let name = file
            .file_stem()
            .map_or_else(|| "script".to_string(), |s| s.to_string_lossy().into_owned());
        Self {
            file,
            name,
            doc: String::new(),
            headers: Vec::new(),
            body: Vec::new(),
            cleanup: Vec::new(),
            process_defs: HashMap::new(),
            env,
        }
    }
}
