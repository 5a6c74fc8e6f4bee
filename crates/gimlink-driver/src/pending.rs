use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gimlink_frame::Frame;
use tokio::sync::oneshot;
use tracing::warn;

/// Commands awaiting an ACK, keyed by sequence number.
///
/// Each entry holds the sending half of a oneshot channel. Resolving an entry
/// delivers the ACK frame to the waiter; dropping an entry (via
/// [`remove`](Self::remove) or [`fail_all`](Self::fail_all)) wakes the waiter
/// with a receive error.
#[derive(Debug, Default)]
pub struct PendingTable {
    inner: Mutex<HashMap<u16, oneshot::Sender<Frame>>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u16, oneshot::Sender<Frame>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `sequence`.
    ///
    /// At most one entry exists per sequence number; a stale entry left by a
    /// wrapped counter is replaced and its waiter fails.
    pub fn register(&self, sequence: u16) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        if self.lock().insert(sequence, tx).is_some() {
            warn!(seq = sequence, "replaced stale pending entry");
        }
        rx
    }

    /// Complete the entry matching `ack.sequence`.
    ///
    /// Returns `false` if nothing was pending for that sequence number.
    pub fn resolve(&self, ack: Frame) -> bool {
        let Some(tx) = self.lock().remove(&ack.sequence) else {
            return false;
        };
        // The waiter may have timed out in the meantime; that is not an error.
        let _ = tx.send(ack);
        true
    }

    pub fn remove(&self, sequence: u16) -> bool {
        self.lock().remove(&sequence).is_some()
    }

    /// Drop every entry, failing all waiters. Returns how many were pending.
    pub fn fail_all(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
