//! Best-effort fan-out of button snapshots
//!
//! Every subscriber owns a bounded mpsc queue. Publishing never waits: a full
//! queue misses this snapshot and the sampler keeps its period however slowly
//! consumers drain.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use super::button_state::ButtonSnapshot;

struct QueueState {
    subscribers: Vec<mpsc::Sender<ButtonSnapshot>>,
    closed: bool,
}

pub struct SnapshotQueue {
    capacity: usize,
    state: Mutex<QueueState>,
}

impl SnapshotQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(QueueState {
                subscribers: Vec::new(),
                closed: false,
            }),
        }
    }

    /// New receiver for snapshots published from now on
    ///
    /// After [`close`](Self::close) the receiver is returned already closed.
    pub fn subscribe(&self) -> mpsc::Receiver<ButtonSnapshot> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            debug!("Subscription after close, returning closed queue");
        } else {
            state.subscribers.push(sender);
            debug!(
                "New snapshot subscriber ({} total)",
                state.subscribers.len()
            );
        }
        receiver
    }

    /// Try-sends `snapshot` to every subscriber, returns how many accepted it
    pub fn publish(&self, snapshot: &ButtonSnapshot) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return 0;
        }
        let mut delivered = 0;
        state
            .subscribers
            .retain(|sender| match sender.try_send(snapshot.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    trace!("Subscriber queue full, dropping snapshot");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Subscriber went away, removing queue");
                    false
                }
            });
        delivered
    }

    /// Drops all senders; receivers drain what is buffered and then see `None`
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.closed = true;
        state.subscribers.clear();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .len()
    }
}
