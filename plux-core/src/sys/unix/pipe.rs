//! Pipe-backed process: the transport for a `[process NAME cmd arg...]`
//! registration, as opposed to a bare `[shell NAME]`'s PTY.
//!
//! Two anonymous pipes (child's stdin, and stdout+stderr merged), `fork`
//! + `execvp`, the parent's read end set non-blocking. Unlike a PTY
//! shell, on exit this synthesizes a `PROCESS-EXIT: <code>` line into its
//! own output stream so match lines can observe termination in-band
//! without a separate "is it still running" primitive.

use std::ffi::CString;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::unistd::{ForkResult, Pid, dup2_stderr, dup2_stdin, dup2_stdout, execvp, fork, pipe, write};

use crate::error::Error;
use crate::process::{LineBuffer, Process};

/// A `[process NAME cmd arg...]` registration, spawned and driven over a
/// pair of pipes.
#[derive(Debug)]
pub struct PipeProcess {
    name: String,
    pid: Pid,
    read_fd: OwnedFd,
    write_fd: OwnedFd,
    alive: bool,
    exit_status: Option<i32>,
    timeout_ms: u64,
    buffer: LineBuffer,
}

impl PipeProcess {
    /// Forks and execs `argv[0]` with `argv[1..]`, wiring its stdin to one
    /// pipe and its merged stdout/stderr to another.
    ///
    /// # Errors
    ///
    /// Returns [`Error`] if either pipe cannot be created, the fork fails,
    /// or `argv` is empty.
    pub fn spawn(name: &str, argv: &[String], default_timeout_ms: u64) -> Result<Self, Error> {
        if argv.is_empty() {
            return Err(Error::shell(name, "process has no command to run"));
        }
        let (stdin_read, stdin_write) = pipe()?;
        let (stdout_read, stdout_write) = pipe()?;

        // SAFETY: single-threaded at this point; the child only calls
        // async-signal-safe functions (and `execvp`) before returning.
        match unsafe { fork() }? {
            ForkResult::Child => {
                drop(stdin_write);
                drop(stdout_read);
                if let Err(err) = run_child(stdin_read, stdout_write, argv) {
                    let msg = format!("plux: failed to start process: {err}\n");
                    let _ =
                        write(unsafe { BorrowedFd::borrow_raw(nix::libc::STDERR_FILENO) }, msg.as_bytes());
                    std::process::exit(127);
                }
                unreachable!("run_child only returns on exec failure, handled above");
            }
            ForkResult::Parent { child } => {
                drop(stdin_read);
                drop(stdout_write);
                set_nonblocking(stdout_read.as_fd())?;
                Ok(Self {
                    name: name.to_string(),
                    pid: child,
                    read_fd: stdout_read,
                    write_fd: stdin_write,
                    alive: true,
                    exit_status: None,
                    timeout_ms: default_timeout_ms,
                    buffer: LineBuffer::new(),
                })
            }
        }
    }
}

fn run_child(stdin_read: OwnedFd, stdout_write: OwnedFd, argv: &[String]) -> Result<std::convert::Infallible, Error> {
    dup2_stdin(&stdin_read)?;
    dup2_stdout(&stdout_write)?;
    dup2_stderr(&stdout_write)?;
    drop(stdin_read);
    drop(stdout_write);

    let args: Vec<CString> = argv
        .iter()
        .map(|a| CString::new(a.as_str()))
        .collect::<Result<_, _>>()
        .map_err(|_| Error::shell("", "argv contains an embedded NUL byte"))?;
    let err = execvp(&args[0], &args).expect_err("execvp only returns on failure");
    Err(Error::from(err))
}

fn set_nonblocking(fd: BorrowedFd<'_>) -> Result<(), Error> {
    let flags = fcntl(fd, FcntlArg::F_GETFL)?;
    let flags = OFlag::from_bits_truncate(flags) | OFlag::O_NONBLOCK;
    fcntl(fd, FcntlArg::F_SETFL(flags))?;
    Ok(())
}

impl Process for PipeProcess {
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
        self.read_fd.as_fd()
    }

    fn fd_output(&self) -> BorrowedFd<'_> {
        self.write_fd.as_fd()
    }

    fn write(&mut self, data: &[u8]) -> Result<bool, Error> {
        match write(self.write_fd.as_fd(), data) {
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
            let synthetic = format!("PROCESS-EXIT: {status}\n");
            let _ = self.buffer.on_output(&self.name, synthetic.as_bytes());
        }
    }

    fn stop(&mut self) -> Result<(), Error> {
        let null = std::fs::File::open("/dev/null")?;
        self.write_fd = OwnedFd::from(null);
        Ok(())
    }
}
