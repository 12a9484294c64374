//! FIFO admission for driver actions.
//!
//! Every action takes a [`Ticket`] synchronously when it is called, then
//! waits for its number to be served. Dropping a ticket or the [`Permit`]
//! it turned into releases the slot, whether the action finished or was
//! cancelled.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

#[derive(Debug, Default)]
struct QueueState {
    issued: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    serving_tx: watch::Sender<u64>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, number: u64) {
        let mut state = self.state();
        if number != state.serving {
            state.abandoned.insert(number);
            return;
        }
        state.serving += 1;
        loop {
            let next = state.serving;
            if !state.abandoned.remove(&next) {
                break;
            }
            state.serving += 1;
        }
        self.serving_tx.send_replace(state.serving);
    }
}

/// Single-lane queue admitting one action at a time in call order.
#[derive(Debug, Clone)]
pub struct ActionQueue {
    shared: Arc<Shared>,
}

impl Default for ActionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionQueue {
    /// Empty queue.
    pub fn new() -> Self {
        let (serving_tx, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                serving_tx,
            }),
        }
    }

    /// Reserve the next place in line.
    pub fn ticket(&self) -> Ticket {
        let number = {
            let mut state = self.shared.state();
            let number = state.issued;
            state.issued += 1;
            number
        };
        Ticket {
            number,
            shared: Some(Arc::clone(&self.shared)),
        }
    }

    /// Tickets issued and not yet released, including the one being served.
    pub fn pending(&self) -> usize {
        let state = self.shared.state();
        (state.issued - state.serving) as usize - state.abandoned.len()
    }

    /// Number of the ticket currently admitted or next to be admitted.
    pub fn now_serving(&self) -> u64 {
        self.shared.state().serving
    }
}

/// Reserved place in an [`ActionQueue`].
#[derive(Debug)]
#[must_use = "dropping a Ticket gives up its place in the queue"]
pub struct Ticket {
    number: u64,
    shared: Option<Arc<Shared>>,
}

impl Ticket {
    /// Position of this ticket.
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Wait until every earlier ticket has been released.
    pub async fn admitted(mut self) -> Permit {
        let Some(shared) = self.shared.take() else {
            return Permit {
                number: self.number,
                shared: None,
            };
        };
        let number = self.number;

        // Hand the slot to a guard so cancellation while waiting still
        // releases it.
        let permit = Permit {
            number,
            shared: Some(Arc::clone(&shared)),
        };
        let mut serving = shared.serving_tx.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = serving.wait_for(|current| *current >= number).await;
        permit
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release(self.number);
        }
    }
}

/// Admission to run; releases the queue slot when dropped.
#[derive(Debug)]
pub struct Permit {
    number: u64,
    shared: Option<Arc<Shared>>,
}

impl Permit {
    /// Position of the admitted ticket.
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.release(self.number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_ticket_admitted_immediately() {
        let queue = ActionQueue::new();
        let permit = queue.ticket().admitted().await;
        assert_eq!(permit.number(), 0);
        assert_eq!(queue.pending(), 1);
        drop(permit);
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.now_serving(), 1);
    }

    #[tokio::test]
    async fn test_admission_follows_ticket_order() {
        let queue = ActionQueue::new();
        let first = queue.ticket();
        let second = queue.ticket();
        assert_eq!(queue.pending(), 2);

        let waiting = tokio::spawn(second.admitted());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        let permit = first.admitted().await;
        drop(permit);

        let permit = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(permit.number(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_ticket_is_skipped() {
        let queue = ActionQueue::new();
        let first = queue.ticket();
        let second = queue.ticket();
        let third = queue.ticket();

        drop(second);
        assert_eq!(queue.pending(), 2);

        drop(first.admitted().await);
        let permit = tokio::time::timeout(Duration::from_secs(1), third.admitted())
            .await
            .unwrap();
        assert_eq!(permit.number(), 2);
        drop(permit);
        assert_eq!(queue.now_serving(), 3);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait_releases_slot() {
        let queue = ActionQueue::new();
        let first = queue.ticket().admitted().await;
        let second = queue.ticket();
        let third = queue.ticket();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), second.admitted()).await;
        assert!(cancelled.is_err());

        drop(first);
        let permit = tokio::time::timeout(Duration::from_secs(1), third.admitted())
            .await
            .unwrap();
        assert_eq!(permit.number(), 2);
    }
}
