//! Payload delivery to the transport layer.

use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::trace;

use rift_types::OwnerId;

use crate::error::SyncResult;
use crate::payload::SyncPayload;

/// Receives sync payloads for delivery to clients.
pub trait SyncSink: Send + Sync {
    /// Deliver one payload. Returns the number of receivers reached.
    fn deliver(&self, payload: SyncPayload) -> SyncResult<usize>;
}

/// Discards every payload.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SyncSink for NullSink {
    fn deliver(&self, _payload: SyncPayload) -> SyncResult<usize> {
        Ok(0)
    }
}

/// A broadcast channel receiver for sync payloads.
pub type PayloadStream = broadcast::Receiver<Arc<SyncPayload>>;

struct Subscriber {
    viewer: OwnerId,
    sender: broadcast::Sender<Arc<SyncPayload>>,
}

impl Subscriber {
    fn wants(&self, payload: &SyncPayload) -> bool {
        self.viewer == payload.viewer
    }
}

/// Fans payloads out to subscribers over `tokio::sync::broadcast`.
///
/// Each subscriber gets its own channel, filtered to a single viewer. Subscribers whose receivers have all been dropped are pruned on
/// the next delivery.
pub struct BroadcastSink {
    capacity: usize,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl std::fmt::Debug for BroadcastSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastSink")
            .field("capacity", &self.capacity)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Receive the payloads addressed to `viewer`.
    pub fn subscribe(&self, viewer: OwnerId) -> PayloadStream {
        let (sender, receiver) = broadcast::channel(self.capacity);
        self.subscribers
            .write()
            .expect("sink lock poisoned")
            .push(Subscriber { viewer, sender });
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().expect("sink lock poisoned").len()
    }
}

impl SyncSink for BroadcastSink {
    fn deliver(&self, payload: SyncPayload) -> SyncResult<usize> {
        let payload = Arc::new(payload);
        let mut reached = 0;
        let mut subs = self.subscribers.write().expect("sink lock poisoned");
        subs.retain(|sub| {
            if sub.wants(&payload) {
                let sent = sub.sender.send(Arc::clone(&payload)).is_ok();
                if sent {
                    reached += 1;
                }
                sent
            } else {
                sub.sender.receiver_count() > 0
            }
        });
        trace!(viewer = %payload.viewer, seq = payload.seq, reached, "payload delivered");
        Ok(reached)
    }
}
