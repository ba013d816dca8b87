//! One-shot wall-clock deadline for a search run.
//!
//! Arming starts a timer thread that cancels the run's [`CancelToken`] when the
//! duration elapses. Disarming wakes the thread and joins it, so once
//! [`DeadlineGuard::disarm`] returns no further cancellation can happen.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::core::cancel::CancelToken;

/// Pending deadline. Dropping the guard disarms it.
#[derive(Debug)]
pub struct DeadlineGuard {
    disarm_tx: Option<Sender<()>>,
    timer: Option<JoinHandle<()>>,
    token: CancelToken,
}

impl DeadlineGuard {
    /// Schedule cancellation of `token` once `duration` has elapsed from now.
    pub fn arm(duration: Duration, token: CancelToken) -> Result<Self> {
        let (disarm_tx, disarm_rx) = mpsc::channel::<()>();
        let time_limit_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let timer_token = token.clone();
        let timer = thread::Builder::new()
            .name("deadline-guard".to_string())
            .spawn(move || match disarm_rx.recv_timeout(duration) {
                Err(RecvTimeoutError::Timeout) => {
                    if timer_token.cancel() {
                        info!(time_limit_ms, "deadline reached, cancelling run");
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    debug!("deadline disarmed before expiry");
                }
            })
            .context("spawn deadline guard thread")?;

        debug!(time_limit_ms, "deadline armed");
        Ok(Self {
            disarm_tx: Some(disarm_tx),
            timer: Some(timer),
            token,
        })
    }

    /// Cancel the pending deadline. Idempotent; a no-op after it fired.
    pub fn disarm(&mut self) {
        if let Some(tx) = self.disarm_tx.take() {
            // The timer may already have exited after firing.
            let _ = tx.send(());
        }
        if let Some(timer) = self.timer.take()
            && timer.join().is_err()
        {
            warn!("deadline guard thread panicked");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    /// True once the deadline has delivered its cancellation.
    pub fn fired(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}
