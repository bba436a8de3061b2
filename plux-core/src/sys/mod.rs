//! Platform adapters. Only Unix (`forkpty`-alike PTY spawn, pipe spawn,
//! readiness poll, signal handling) is implemented; the `Process`/`Runner`
//! layers above this module are platform-neutral.

#[cfg(unix)]
pub mod unix;

#[cfg(unix)]
pub use unix::{pipe, poll, pty};
