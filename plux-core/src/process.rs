//! The `Process` capability: the Runner's narrow view onto either a
//! PTY-backed shell or a pipe-backed `[process]`, plus the line-framing
//! buffer both variants share.
//!
//! One shared [`LineBuffer`] owns line framing, error-pattern matching,
//! and timeout/name bookkeeping; a `Process` trait object per shell
//! differs only in how it spawns and which fds it exposes.

use std::os::fd::BorrowedFd;

use crate::error::Error;
use crate::regex::Regex;

/// The line-framing and error-pattern state owned by every spawned
/// process, independent of how it was spawned.
///
/// On a completed line (newline seen), a trailing `\r` is stripped, the
/// error pattern is checked, and — unless the in-progress buffer was
/// already "consumed" by a mid-line match — the line is appended to
/// [`LineBuffer::lines`]. The error pattern is also checked against the
/// partial tail on every update, unless the pattern is end-anchored.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Vec<String>,
    buf: String,
    buf_matched: bool,
    error_pattern: Option<Regex>,
}

impl LineBuffer {
    /// Creates an empty buffer with no error pattern set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames newly read bytes: splits on `\n`, strips a trailing `\r`,
    /// checks the error pattern, and pushes completed lines.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the error pattern matches a completed line or
    /// the current partial tail.
    pub fn on_output(&mut self, shell: &str, data: &[u8]) -> Result<(), Error> {
        let text = String::from_utf8_lossy(data);
        for c in text.chars() {
            if c == '\n' {
                if self.buf.ends_with('\r') {
                    self.buf.pop();
                }
                self.check_error_pattern(shell, &self.buf.clone(), true)?;
                if !self.buf_matched {
                    self.lines.push(std::mem::take(&mut self.buf));
                } else {
                    self.buf.clear();
                }
                self.buf_matched = false;
            } else {
                self.buf.push(c);
            }
        }
        self.check_error_pattern(shell, &self.buf.clone(), false)?;
        Ok(())
    }

    fn check_error_pattern(&self, shell: &str, line: &str, is_line: bool) -> Result<(), Error> {
        let Some(pattern) = &self.error_pattern else {
            return Ok(());
        };
        if !is_line && pattern.is_end_anchored() {
            return Ok(());
        }
        if pattern.search(line)?.is_some() {
            return Err(Error::shell(
                shell,
                format!("error pattern '{}' matched", pattern.as_str()),
            ));
        }
        Ok(())
    }

    /// Completed lines not yet consumed by a match, oldest first.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Drops the first `count` completed lines (the matched one and
    /// everything before it).
    pub fn consume_until(&mut self, count: usize) {
        self.lines.drain(..count.min(self.lines.len()));
    }

    /// The not-yet-newline-terminated tail, or empty if it was already
    /// consumed by a mid-buffer match (load-bearing for `SH-PROMPT:`-style
    /// waits: callers must not see the same partial buffer satisfy two
    /// matches in a row).
    pub fn buf(&self) -> &str {
        if self.buf_matched {
            ""
        } else {
            &self.buf
        }
    }

    /// Marks the current partial buffer as consumed by a match; it will
    /// read as empty until the next newline arrives.
    pub fn consume_buf(&mut self) {
        self.buf_matched = true;
    }

    /// Compiles and installs a new error pattern; empty `pattern` clears
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if `pattern` fails to compile as a regex.
    pub fn set_error_pattern(&mut self, pattern: &str) -> Result<(), Error> {
        self.error_pattern = if pattern.is_empty() {
            None
        } else {
            Some(Regex::new(pattern)?)
        };
        Ok(())
    }
}

/// Runner-facing capability over a spawned shell or process, abstracting
/// over PTY vs. pipe transport.
pub trait Process: std::fmt::Debug {
    /// The shell name this process was spawned for.
    fn name(&self) -> &str;
    /// The child's process id.
    fn pid(&self) -> nix::unistd::Pid;
    /// Whether the child is still believed to be running.
    fn is_alive(&self) -> bool;
    /// The child's exit status, once [`Process::set_alive`] has recorded
    /// one.
    fn exit_status(&self) -> Option<i32>;
    /// The fd the Runner polls/reads for output. For a PTY shell this is
    /// the same fd as [`Process::fd_output`]; for a pipe process it is the
    /// read end of the child's stdout/stderr pipe.
    fn fd_input(&self) -> BorrowedFd<'_>;
    /// The fd [`Process::write`] sends to. For a PTY shell this is the
    /// same fd as [`Process::fd_input`]; for a pipe process it is the
    /// write end of the child's stdin pipe.
    fn fd_output(&self) -> BorrowedFd<'_>;
    /// Writes `data` to the child's input, best-effort non-blocking.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] on any I/O failure other than `EAGAIN`, which is
    /// reported as `Ok(false)`.
    fn write(&mut self, data: &[u8]) -> Result<bool, Error>;
    /// Feeds newly read bytes through this process's line framing.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the error pattern matches.
    fn on_output(&mut self, data: &[u8]) -> Result<(), Error>;
    /// Completed, not-yet-consumed lines, oldest first.
    fn lines(&self) -> &[String];
    /// Drops the first `count` completed lines.
    fn consume_until(&mut self, count: usize);
    /// The not-yet-newline-terminated tail.
    fn buf(&self) -> &str;
    /// Marks the current partial buffer as consumed.
    fn consume_buf(&mut self);
    /// Current per-shell timeout in milliseconds.
    fn timeout_ms(&self) -> u64;
    /// Overrides the per-shell timeout.
    fn set_timeout_ms(&mut self, ms: u64);
    /// Compiles and installs a new error pattern (empty clears it).
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if `pattern` fails to compile.
    fn set_error_pattern(&mut self, pattern: &str) -> Result<(), Error>;
    /// Records that the child has exited, called by the reaper on
    /// `SIGCHLD`.
    fn set_alive(&mut self, alive: bool, status: i32);
    /// Cooperative stop: best-effort `ETX`/`EOT`, close the input fd, then
    /// the caller is expected to `SIGKILL` + wait.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if closing the fd fails.
    fn stop(&mut self) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn completed_lines_accumulate_in_order() {
        let mut buf = LineBuffer::new();
        buf.on_output("s1", b"hello\nworld\n").unwrap();
        assert_eq!(buf.lines(), ["hello", "world"]);
        assert_eq!(buf.buf(), "");
    }

    #[test]
    fn trailing_cr_is_stripped() {
        let mut buf = LineBuffer::new();
        buf.on_output("s1", b"hello\r\n").unwrap();
        assert_eq!(buf.lines(), ["hello"]);
    }

    #[test]
    fn partial_tail_is_visible_until_newline() {
        let mut buf = LineBuffer::new();
        buf.on_output("s1", b"partial").unwrap();
        assert_eq!(buf.lines().len(), 0);
        assert_eq!(buf.buf(), "partial");
    }

    #[test]
    fn consume_until_drops_prior_lines() {
        let mut buf = LineBuffer::new();
        buf.on_output("s1", b"a\nb\nc\n").unwrap();
        buf.consume_until(2);
        assert_eq!(buf.lines(), ["c"]);
    }

    #[test]
    fn consume_buf_hides_partial_until_next_newline() {
        let mut buf = LineBuffer::new();
        buf.on_output("s1", b"SH-PROMPT:").unwrap();
        buf.consume_buf();
        assert_eq!(buf.buf(), "");
        buf.on_output("s1", b"x").unwrap();
        assert_eq!(buf.buf(), "x");
    }

    #[test]
    fn error_pattern_on_completed_line_is_a_fault() {
        let mut buf = LineBuffer::new();
        buf.set_error_pattern("ERROR").unwrap();
        assert!(buf.on_output("s1", b"an ERROR occurred\n").is_err());
    }

    #[test]
    fn end_anchored_error_pattern_ignores_partial_tail() {
        let mut buf = LineBuffer::new();
        buf.set_error_pattern("ERROR$").unwrap();
        assert!(buf.on_output("s1", b"ERROR but not yet").is_ok());
    }

    #[test]
    fn clearing_error_pattern_with_empty_string_disarms_it() {
        let mut buf = LineBuffer::new();
        buf.set_error_pattern("ERROR").unwrap();
        buf.set_error_pattern("").unwrap();
        assert!(buf.on_output("s1", b"an ERROR occurred\n").is_ok());
    }
}
