//! Broadcast hub: observer registry and transcript fan-out.
//!
//! The hub owns the observer registry exclusively: observers are added on
//! [`subscribe`](BroadcastHub::subscribe), removed on the first failed
//! delivery or an explicit [`unsubscribe`](BroadcastHub::unsubscribe), and
//! no other component may touch the registry.
//!
//! Ordering guarantee: a new observer receives the full transcript history
//! as a burst of individual entries in sequence order, then every later
//! entry exactly once, in order, with no gap and no duplicate, even when a
//! publish races the subscribe call. Two mechanisms enforce this:
//!
//! - [`record`](BroadcastHub::record) appends to the store and delivers to
//!   observers under the registry lock, the same serialization point
//!   `subscribe` snapshots history under;
//! - each observer carries a sequence high-water mark, so a direct
//!   [`publish`](BroadcastHub::publish) of an entry the history burst
//!   already covered is deduplicated.
//!
//! Delivery is a non-blocking send into an unbounded channel, so one slow
//! observer never delays the rest; a send failure means the receiving side
//! is gone and removes that observer only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::StorageError;
use crate::transcript::{TranscriptEntry, TranscriptStore};

/// Receiving end of a subscription, returned by
/// [`subscribe`](BroadcastHub::subscribe).
///
/// Dropping the handle (or its receiver) disconnects the observer; the hub
/// notices on the next delivery attempt.
pub struct ObserverHandle {
    /// Registry identifier, used for [`unsubscribe`](BroadcastHub::unsubscribe).
    pub id: Uuid,
    /// Entry stream: history burst first, then live entries.
    pub receiver: mpsc::UnboundedReceiver<TranscriptEntry>,
}

struct ObserverSlot {
    sender: mpsc::UnboundedSender<TranscriptEntry>,
    /// Highest sequence number already delivered to this observer.
    last_sequence: u64,
}

/// Publish/subscribe hub fanning transcript entries out to observers.
pub struct BroadcastHub {
    store: Arc<TranscriptStore>,
    observers: Mutex<HashMap<Uuid, ObserverSlot>>,
}

impl std::fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("observers", &self.observers.lock().len())
            .finish()
    }
}

impl BroadcastHub {
    /// Create a hub over the given store.
    pub fn new(store: Arc<TranscriptStore>) -> Self {
        Self {
            store,
            observers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new observer.
    ///
    /// Sends the full current transcript into the observer's channel before
    /// the observer becomes live for subsequent publishes. The history
    /// snapshot and the registration happen under the registry lock, so no
    /// concurrently recorded entry can fall into a gap.
    pub fn subscribe(&self) -> ObserverHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut observers = self.observers.lock();
        let history = self.store.read_all();
        let mut last_sequence = 0;
        for entry in history {
            last_sequence = entry.sequence;
            // The receiver is still owned by us, so this cannot fail.
            let _ = sender.send(entry);
        }
        observers.insert(
            id,
            ObserverSlot {
                sender,
                last_sequence,
            },
        );
        log::debug!("observer {} subscribed ({} connected)", id, observers.len());

        ObserverHandle { id, receiver }
    }

    /// Remove an observer. Idempotent: unknown handles are ignored.
    pub fn unsubscribe(&self, id: Uuid) {
        let mut observers = self.observers.lock();
        if observers.remove(&id).is_some() {
            log::debug!("observer {} unsubscribed ({} connected)", id, observers.len());
        }
    }

    /// Append an entry to the store and deliver it to every observer, as
    /// one operation under the registry lock.
    ///
    /// This is the canonical write path: because append and delivery share
    /// the subscribe serialization point, observers see entries in exact
    /// append order.
    pub fn record(
        &self,
        sender: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<TranscriptEntry, StorageError> {
        let mut observers = self.observers.lock();
        let entry = self.store.append(sender, text)?;
        Self::deliver(&mut observers, &entry);
        Ok(entry)
    }

    /// Deliver an already-appended entry to every subscribed observer.
    ///
    /// Best-effort per observer: a failed delivery removes that observer
    /// and never aborts delivery to the rest. Entries at or below an
    /// observer's high-water mark are skipped (already seen via the
    /// history burst).
    pub fn publish(&self, entry: &TranscriptEntry) {
        let mut observers = self.observers.lock();
        Self::deliver(&mut observers, entry);
    }

    /// Number of currently connected observers.
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    fn deliver(observers: &mut HashMap<Uuid, ObserverSlot>, entry: &TranscriptEntry) {
        observers.retain(|id, slot| {
            if entry.sequence <= slot.last_sequence {
                return true;
            }
            match slot.sender.send(entry.clone()) {
                Ok(()) => {
                    slot.last_sequence = entry.sequence;
                    true
                }
                Err(_) => {
                    log::info!("observer {} disconnected, removing", id);
                    false
                }
            }
        });
    }
}
