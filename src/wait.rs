//! Bounded polling of hardware conditions.
//!
//! Every operation that waits on the hardware takes a [`Wait`]. The default
//! is a bounded number of polls, so a device that never answers produces
//! [`Error::Timeout`](crate::Error::Timeout) instead of a thread that spins
//! forever. Unbounded waiting is still available, but you have to ask for
//! it with [`Wait::Forever`].

use crate::{Error, Result};

/// Default poll budget used by [`Wait::default`].
pub const DEFAULT_POLLS: u32 = 1 << 24;

/// How long an operation may wait for the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// Don't wait. The operation proceeds (or returns) without checking the
    /// condition.
    No,
    /// Check the condition at most this many times.
    Polls(u32),
    /// Spin until the condition is true, no matter how long it takes.
    Forever,
    /// Poll until the condition is true or the instant passes.
    #[cfg(feature = "std")]
    Until(std::time::Instant),
}

impl Default for Wait {
    fn default() -> Self {
        Wait::Polls(DEFAULT_POLLS)
    }
}

impl From<bool> for Wait {
    fn from(wait: bool) -> Self {
        if wait {
            Wait::default()
        } else {
            Wait::No
        }
    }
}

#[cfg(feature = "std")]
impl From<std::time::Duration> for Wait {
    fn from(timeout: std::time::Duration) -> Self {
        Wait::Until(std::time::Instant::now() + timeout)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        fn relax() {
            std::thread::yield_now();
        }
        fn expired(wait: &Wait) -> bool {
            matches!(wait, Wait::Until(deadline) if std::time::Instant::now() >= *deadline)
        }
    } else {
        fn relax() {
            core::hint::spin_loop();
        }
        fn expired(_: &Wait) -> bool {
            false
        }
    }
}

impl Wait {
    /// `true` unless this is [`Wait::No`].
    pub fn is_blocking(&self) -> bool {
        !matches!(self, Wait::No)
    }

    /// Poll `ready` until it returns `true`.
    ///
    /// Errors from `ready` end the wait. [`Wait::No`] returns immediately
    /// without calling `ready`.
    pub(crate) fn poll(self, mut ready: impl FnMut() -> Result<bool>) -> Result<()> {
        let mut budget = match self {
            Wait::No => return Ok(()),
            Wait::Polls(polls) => Some(polls),
            _ => None,
        };
        loop {
            if ready()? {
                return Ok(());
            }
            match budget {
                Some(0) => break,
                Some(remaining) => budget = Some(remaining - 1),
                None if expired(&self) => break,
                None => {}
            }
            relax();
        }
        log::warn!("gave up waiting for hardware ({self:?})");
        Err(Error::Timeout)
    }
}
