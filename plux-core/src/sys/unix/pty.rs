//! PTY-backed shell: the default transport for a bare `[shell NAME]`, used
//! whenever the script does not register a `[process NAME cmd ...]` for
//! that name.
//!
//! Opens a PTY, forks, and execs a shell behind the slave side; the
//! parent keeps the master fd non-blocking and lets the `Runner`
//! multiplex it directly rather than reading it on a dedicated thread.

use std::ffi::CString;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::libc;
use nix::pty::openpty;
use nix::unistd::{ForkResult, Pid, dup2_stderr, dup2_stdin, dup2_stdout, execvp, fork, setsid, write};

use crate::error::Error;
use crate::process::{LineBuffer, Process};
use crate::variables::FORCED_OS_ENV;

/// The shell binary spawned behind every PTY, pinned to a POSIX `sh` so
/// scripts see a consistent prompt/behavior across hosts.
const SHELL_PATH: &str = "/bin/sh";

/// A `[shell NAME]` backed by a pseudo-terminal, interactive `sh`.
#[derive(Debug)]
pub struct PtyShell {
    name: String,
    pid: Pid,
    master: OwnedFd,
    alive: bool,
    exit_status: Option<i32>,
    timeout_ms: u64,
    buffer: LineBuffer,
}

impl PtyShell {
    /// Forks and execs `/bin/sh` behind a fresh PTY, applying the forced
    /// OS environment overrides (`ENV`, `PS1`) in the child.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if the PTY cannot be opened, the fork fails, or
    /// any child-side setup syscall fails (the failure is only observable
    /// in the parent if it happens before `fork` returns; child-side
    /// failures after fork abort the child process).
    pub fn spawn(name: &str, default_timeout_ms: u64) -> Result<Self, Error> {
        let pty = openpty(None, None)?;

        // SAFETY: single-threaded at this point in the process; the child
        // only calls async-signal-safe functions (and `execvp`) before
        // returning control to user code.
        match unsafe { fork() }? {
            ForkResult::Child => {
                drop(pty.master);
                if let Err(err) = run_child(pty.slave) {
                    let msg = format!("plux: failed to start shell: {err}\n");
                    let _ = write(unsafe { BorrowedFd::borrow_raw(libc::STDERR_FILENO) }, msg.as_bytes());
                    std::process::exit(127);
                }
                unreachable!("run_child only returns on exec failure, handled above");
            }
            ForkResult::Parent { child } => {
                drop(pty.slave);
                set_nonblocking(pty.master.as_fd())?;
                Ok(Self {
                    name: name.to_string(),
                    pid: child,
                    master: pty.master,
                    alive: true,
                    exit_status: None,
                    timeout_ms: default_timeout_ms,
                    buffer: LineBuffer::new(),
                })
            }
        }
    }
}

fn run_child(slave: OwnedFd) -> Result<std::convert::Infallible, Error> {
    setsid()?;

    // SAFETY: TIOCSCTTY with a null third argument is the documented way
    // to make the calling session's controlling terminal the given fd.
    let rc = unsafe { libc::ioctl(std::os::fd::AsRawFd::as_raw_fd(&slave), libc::TIOCSCTTY as _, 0) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    dup2_stdin(&slave)?;
    dup2_stdout(&slave)?;
    dup2_stderr(&slave)?;
    drop(slave);

    // SAFETY: single-threaded child, no other code runs before exec.
    for (key, val) in FORCED_OS_ENV {
        unsafe {
            std::env::set_var(key, val);
        }
    }

    #[expect(clippy::expect_used)]
    let prog = CString::new(SHELL_PATH).expect("SHELL_PATH is a NUL-free literal");
    #[expect(clippy::expect_used)]
    let arg0 = CString::new(SHELL_PATH).expect("SHELL_PATH is a NUL-free literal");
    #[expect(clippy::expect_used)]
    let err = execvp(&prog, &[arg0]).expect_err("execvp only returns on failure");
    Err(Error::from(err))
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<(), Error> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

impl Process for PtyShell {
    fn name(&self) -> &str {
        &self.name
    }

    fn pid(&self) -> Pid {
        self.pid
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    fn fd_input(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }

    fn fd_output(&self) -> BorrowedFd<'_> {
        self.master.as_fd()
    }

    fn write(&mut self, data: &[u8]) -> Result<bool, Error> {
        match write(self.master.as_fd(), data) {
            Ok(n) => Ok(n == data.len()),
            Err(nix::Error::EAGAIN) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn on_output(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buffer.on_output(&self.name, data)
    }

    fn lines(&self) -> &[String] {
        self.buffer.lines()
    }

    fn consume_until(&mut self, count: usize) {
        self.buffer.consume_until(count);
    }

    fn buf(&self) -> &str {
        self.buffer.buf()
    }

    fn consume_buf(&mut self) {
        self.buffer.consume_buf();
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    fn set_timeout_ms(&mut self, ms: u64) {
        self.timeout_ms = ms;
    }

    fn set_error_pattern(&mut self, pattern: &str) -> Result<(), Error> {
        self.buffer.set_error_pattern(pattern)
    }

    fn set_alive(&mut self, alive: bool, status: i32) {
        self.alive = alive;
        if !alive {
            self.exit_status = Some(status);
        }
    }

    fn stop(&mut self) -> Result<(), Error> {
        // ETX then EOT, best effort: a well-behaved shell exits on either.
        let _ = self.write(b"\x03");
        let _ = self.write(b"\x04");
        // Replacing (rather than manually closing) the master fd drops and
        // closes the original as a side effect, so the child observes EOF
        // even if it ignored both control characters.
        let null = std::fs::File::open("/dev/null")?;
        self.master = OwnedFd::from(null);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_os_env_includes_ps1_and_env() {
        let keys: Vec<&str> = FORCED_OS_ENV.iter().map(|(k, _)| *k).collect();
        assert!(keys.contains(&"PS1"));
        assert!(keys.contains(&"ENV"));
    }
}
