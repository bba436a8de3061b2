//! Persisted, append-only transcripts: per-shell input/output logs and
//! the script-wide progress log.
//!
//! These are plain [`std::fs::File`] appenders rather than `tracing`
//! output: they are byte-for-byte fixtures other tooling diffs against,
//! which a structured logging subscriber cannot reproduce. Internal
//! engine diagnostics go through `tracing` separately; see
//! [`crate::runner::Runner`].

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends a shell's input and output bytes to `<dir>/<name>_input.log`
/// and `<dir>/<name>_output.log`.
pub trait ShellLog: std::fmt::Debug {
    /// Records bytes written to the shell's input.
    fn input(&mut self, data: &[u8]);
    /// Records bytes read from the shell's output.
    fn output(&mut self, data: &[u8]);
}

/// A [`ShellLog`] backed by two append-only files under the configured log
/// directory, optionally mirroring input to stderr (`-t`/`--tail`).
#[derive(Debug)]
pub struct FileShellLog {
    input_file: File,
    output_file: File,
    tail: bool,
}

impl FileShellLog {
    /// Opens (creating if needed) `<dir>/<name>_input.log` and
    /// `<dir>/<name>_output.log`.
    ///
    /// # Errors
    ///
    /// Returns an error if the log directory cannot be created or the log
    /// files cannot be opened for append.
    pub fn open(dir: &Path, name: &str, tail: bool) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let input_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{name}_input.log")))?;
        let output_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(format!("{name}_output.log")))?;
        Ok(Self {
            input_file,
            output_file,
            tail,
        })
    }
}

impl ShellLog for FileShellLog {
    fn input(&mut self, data: &[u8]) {
        let _ = self.input_file.write_all(data);
        if self.tail {
            let _ = std::io::stderr().write_all(data);
        }
    }

    fn output(&mut self, data: &[u8]) {
        let _ = self.output_file.write_all(data);
    }
}

/// A [`ShellLog`] that discards everything, used for the empty shell name
/// (headers/function-argument context, never a real child process).
#[derive(Debug, Default)]
pub struct NullShellLog;

impl ShellLog for NullShellLog {
    fn input(&mut self, _data: &[u8]) {}
    fn output(&mut self, _data: &[u8]) {}
}

/// Append-only `./plux.progress.log`, mirroring `[progress]`/`[log]` line
/// content. Lines are also echoed to stdout, but by the `Runner`, since it
/// owns the timestamp formatting.
#[derive(Debug)]
pub struct ProgressLog {
    file: Option<File>,
}

impl ProgressLog {
    /// Opens (creating if needed) `path` for append.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened for append.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { file: Some(file) })
    }

    /// A progress log that discards everything; used in tests.
    pub fn discard() -> Self {
        Self { file: None }
    }

    /// Appends one `[shell] message` line.
    pub fn log(&mut self, shell: &str, message: &str) {
        if let Some(file) = &mut self.file {
            let _ = writeln!(file, "[{shell}] {message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn file_shell_log_appends_to_separate_files() {
        let dir = tempfile_dir();
        let mut log = FileShellLog::open(&dir, "s1", false).unwrap();
        log.input(b"echo hi\n");
        log.output(b"hi\n");

        let input = std::fs::read(dir.join("s1_input.log")).unwrap();
        let output = std::fs::read(dir.join("s1_output.log")).unwrap();
        assert_eq!(input, b"echo hi\n");
        assert_eq!(output, b"hi\n");

        std::fs::remove_dir_all(&dir).ok();
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "plux-log-test-{}-{}",
            std::process::id(),
            tempfile_unique_suffix()
        ));
        dir
    }

    fn tempfile_unique_suffix() -> u64 {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        COUNTER.fetch_add(1, Ordering::Relaxed)
    }
}
