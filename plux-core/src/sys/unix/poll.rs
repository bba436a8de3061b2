//! Readiness-poll primitive multiplexing every live shell's input fd.

use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use nix::poll::{PollFd, PollFlags, PollTimeout, poll};

/// The outcome of one [`poll_ready`] call.
#[derive(Debug)]
pub enum PollOutcome {
    /// At least one fd is ready; holds the indices (into the slice passed
    /// to [`poll_ready`]) of the ready fds.
    Ready(Vec<usize>),
    /// No fd became ready before `timeout` elapsed.
    TimedOut,
    /// The poll was interrupted by a signal (EINTR); callers should drain
    /// pending signal work and retry with the same deadline.
    Interrupted,
}

/// Polls `fds` for readability (or hangup/error, which we also treat as
/// "ready" so the caller observes EOF) up to `timeout`.
pub fn poll_ready(fds: &[BorrowedFd<'_>], timeout: Duration) -> Result<PollOutcome, nix::Error> {
    let mut pollfds: Vec<PollFd<'_>> = fds
        .iter()
        .map(|fd| PollFd::new(fd.as_fd(), PollFlags::POLLIN))
        .collect();

    const MAX_POLL_MS: u128 = i32::MAX as u128;
    let clamped_ms = timeout.as_millis().min(MAX_POLL_MS);
    #[expect(clippy::cast_possible_truncation)]
    let clamped_ms = clamped_ms as i32;
    let timeout = PollTimeout::try_from(clamped_ms).unwrap_or(PollTimeout::MAX);

    match poll(&mut pollfds, timeout) {
        Ok(0) => Ok(PollOutcome::TimedOut),
        Ok(_) => {
            let ready: Vec<usize> = pollfds
                .iter()
                .enumerate()
                .filter_map(|(i, pfd)| {
                    let revents = pfd.revents().unwrap_or(PollFlags::empty());
                    if revents.intersects(
                        PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR,
                    ) {
                        Some(i)
                    } else {
                        None
                    }
                })
                .collect();
            Ok(PollOutcome::Ready(ready))
        }
        Err(nix::Error::EINTR) => Ok(PollOutcome::Interrupted),
        Err(e) => Err(e),
    }
}
