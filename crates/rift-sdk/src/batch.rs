//! Insert batching and refill throttling for sharing objects.

use std::time::Duration;

use rift_types::{ItemVariant, OwnerId, TemplateHash, Timestamp};

/// Units of one template waiting in a buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingInsert {
    pub hash: TemplateHash,
    pub variant: ItemVariant,
    pub count: u64,
}

/// Units queued by a sharing object, not yet credited to its root.
///
/// Pushes of the same template are aggregated, so a flush applies one
/// ledger mutation per template. Buffered units are in transit: they are
/// in no ledger and no reference count until flushed.
#[derive(Clone, Debug)]
pub struct InsertBuffer {
    root: OwnerId,
    pending: Vec<PendingInsert>,
    oldest: Option<Timestamp>,
}

impl InsertBuffer {
    pub fn new(root: OwnerId) -> Self {
        Self {
            root,
            pending: Vec::new(),
            oldest: None,
        }
    }

    /// The owner that receives this buffer's units.
    pub fn root(&self) -> OwnerId {
        self.root
    }

    pub fn push(&mut self, hash: TemplateHash, variant: &ItemVariant, count: u64, now: Timestamp) {
        if count == 0 {
            return;
        }
        match self.pending.iter_mut().find(|p| p.hash == hash) {
            Some(p) => p.count = p.count.saturating_add(count),
            None => self.pending.push(PendingInsert {
                hash,
                variant: variant.clone(),
                count,
            }),
        }
        self.oldest.get_or_insert(now);
    }

    /// `true` once the oldest buffered unit has waited at least `delay`.
    pub fn is_due(&self, now: Timestamp, delay: Duration) -> bool {
        self.oldest
            .map_or(false, |oldest| now.saturating_since(oldest) >= delay)
    }

    /// Remove and return everything buffered, in first-push order.
    pub fn drain(&mut self) -> Vec<PendingInsert> {
        self.oldest = None;
        std::mem::take(&mut self.pending)
    }

    /// Total buffered units.
    pub fn units(&self) -> u64 {
        self.pending.iter().map(|p| p.count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Allows one refill per interval.
#[derive(Clone, Debug)]
pub struct RefillThrottle {
    interval: Duration,
    last: Option<Timestamp>,
}

impl RefillThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn is_ready(&self, now: Timestamp) -> bool {
        self.last
            .map_or(true, |last| now.saturating_since(last) >= self.interval)
    }

    /// Claim the slot for `now` if the interval has passed.
    pub fn try_acquire(&mut self, now: Timestamp) -> bool {
        if self.is_ready(now) {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}
