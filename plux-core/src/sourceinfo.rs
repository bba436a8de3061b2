//! Source-location tagging shared by every parsed [`crate::ast::Line`].

use std::path::{Path, PathBuf};

/// The file and line number a [`crate::ast::Line`] was parsed from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceInfo {
    /// Path of the script file (or include) the line came from.
    pub path: PathBuf,
    /// 1-based line number within that file.
    pub linenumber: u32,
}

impl SourceInfo {
    /// Creates a new source location.
    pub fn new(path: impl Into<PathBuf>, linenumber: u32) -> Self {
        Self {
            path: path.into(),
            linenumber,
        }
    }

    /// Returns the directory containing this source's file, used to
    /// resolve relative `[include path]` directives.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl std::fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.linenumber)
    }
}
