use std::{
    sync::{Arc, Condvar, Mutex},
    time::Duration,
};

use chrono::TimeDelta;

/// Shared shutdown signal. Every worker observes it at its suspension
/// points: loops check [`CancelToken::is_cancelled`] between steps and use
/// [`CancelToken::sleep_for`] instead of a plain sleep so cancellation wakes
/// them immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    shared: Arc<CancelShared>,
}

#[derive(Debug, Default)]
struct CancelShared {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.shared.cancelled.lock().unwrap();
        *cancelled = true;
        self.shared.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shared.cancelled.lock().unwrap()
    }

    /// Sleeps for `delta`, waking early if the token is cancelled. Returns
    /// false if the token was cancelled before or during the wait.
    pub fn sleep_for(&self, delta: TimeDelta) -> bool {
        let timeout = delta.to_std().unwrap_or(Duration::ZERO);

        let cancelled = self.shared.cancelled.lock().unwrap();
        let (cancelled, _) = self
            .shared
            .cv
            .wait_timeout_while(cancelled, timeout, |cancelled| !*cancelled)
            .unwrap();

        !*cancelled
    }
}
