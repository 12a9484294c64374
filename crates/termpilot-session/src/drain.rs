//! Pending-write accounting between transport output and screen application.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

#[derive(Debug, Default)]
struct DrainState {
    pending: usize,
    waiters: Vec<oneshot::Sender<()>>,
    released: bool,
}

/// Counts chunks handed to the screen model but not yet applied.
///
/// Waiters are woken in registration order when the count returns to zero,
/// or all at once on [`DrainTracker::release_all`].
#[derive(Debug, Default)]
pub struct DrainTracker {
    state: Mutex<DrainState>,
}

impl DrainTracker {
    /// Tracker with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DrainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A chunk was handed to the screen model.
    pub fn begin(&self) {
        self.state().pending += 1;
    }

    /// A chunk finished applying.
    pub fn complete(&self) {
        let waiters = {
            let mut state = self.state();
            state.pending = state.pending.saturating_sub(1);
            if state.pending > 0 {
                return;
            }
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Number of chunks not yet applied.
    pub fn pending(&self) -> usize {
        self.state().pending
    }

    /// Receiver that fires once the count reaches zero.
    ///
    /// Returns `None` when nothing is pending or the tracker was released.
    pub fn waiter(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state();
        if state.released || state.pending == 0 {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.push(tx);
        Some(rx)
    }

    /// Wake every waiter and treat all later drains as complete.
    pub fn release_all(&self) {
        let waiters = {
            let mut state = self.state();
            state.released = true;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    /// Resolve once nothing is pending.
    pub async fn drained(&self) {
        if let Some(rx) = self.waiter() {
            // A dropped sender means the tracker went away; count that as drained.
            let _ = rx.await;
        }
    }
}
