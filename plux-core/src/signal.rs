//! `SignalBus`: the single point of global mutable state signal handlers
//! are allowed to touch.
//!
//! Handler bodies are kept minimal (a single atomic write); real work is
//! deferred to the main loop rather than done non-async-signal-safely
//! inside the handler itself.

use std::sync::atomic::{AtomicBool, Ordering};

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);
static CHILD_EXITED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_stop_signal(_signum: nix::libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

extern "C" fn on_sigchld(_signum: nix::libc::c_int) {
    CHILD_EXITED.store(true, Ordering::SeqCst);
}

/// Installs handlers for `SIGINT`/`SIGHUP`/`SIGTERM` (set [`stop_requested`])
/// and `SIGCHLD` (set [`take_child_exited`]).
///
/// # Errors
///
/// Returns an error if `sigaction` fails for any of the four signals.
pub fn install() -> Result<(), nix::Error> {
    let stop_action = nix::sys::signal::SigAction::new(
        nix::sys::signal::SigHandler::Handler(on_stop_signal),
        nix::sys::signal::SaFlags::SA_RESTART,
        nix::sys::signal::SigSet::empty(),
    );
    let chld_action = nix::sys::signal::SigAction::new(
        nix::sys::signal::SigHandler::Handler(on_sigchld),
        nix::sys::signal::SaFlags::SA_RESTART,
        nix::sys::signal::SigSet::empty(),
    );

    // SAFETY: both handlers only perform a single atomic store, which is
    // async-signal-safe; no allocation, locking, or I/O happens in either.
    unsafe {
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGINT, &stop_action)?;
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGHUP, &stop_action)?;
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGTERM, &stop_action)?;
        nix::sys::signal::sigaction(nix::sys::signal::Signal::SIGCHLD, &chld_action)?;
    }
    Ok(())
}

/// Whether a stop signal (`SIGINT`/`SIGHUP`/`SIGTERM`) has been received.
/// Once set, this never clears: a stop request ends the run.
pub fn stop_requested() -> bool {
    STOP_REQUESTED.load(Ordering::SeqCst)
}

/// Reads and clears the "a child may have exited" flag set by `SIGCHLD`.
/// Returns `true` if a `SIGCHLD` arrived since the last call.
pub fn take_child_exited() -> bool {
    CHILD_EXITED.swap(false, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn child_exited_flag_is_consumed_once() {
        CHILD_EXITED.store(true, Ordering::SeqCst);
        assert!(take_child_exited());
        assert!(!take_child_exited());
    }

    #[test]
    fn stop_requested_reflects_flag() {
        let before = STOP_REQUESTED.load(Ordering::SeqCst);
        STOP_REQUESTED.store(true, Ordering::SeqCst);
        assert!(stop_requested());
        STOP_REQUESTED.store(before, Ordering::SeqCst);
        assert_eq!(stop_requested(), before);
    }
}
