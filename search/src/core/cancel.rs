//! Cooperative cancellation shared between the deadline timer and the run loop.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Error reported by any code that stops early because the run deadline fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded;

impl fmt::Display for DeadlineExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution timed out")
    }
}

impl std::error::Error for DeadlineExceeded {}

/// True if `err`, one of its context layers, or any of its causes is
/// [`DeadlineExceeded`].
pub fn is_deadline_exceeded(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DeadlineExceeded>().is_some()
        || err.chain().any(|cause| cause.is::<DeadlineExceeded>())
}

/// One-way cancellation flag. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        !self.cancelled.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Safe point: fail with [`DeadlineExceeded`] once cancelled.
    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        if self.is_cancelled() {
            Err(DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}
