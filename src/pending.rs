use std::collections::HashSet;

use crate::entry::EntryKey;

/// Per-key write serializer. At most one update per key may be in flight;
/// callers that lose the race drop their update instead of queueing it.
#[derive(Debug, Default)]
pub struct PendingKeys {
    in_flight: HashSet<EntryKey>,
}

impl PendingKeys {
    /// Claims the key for one write. Returns false when a write for the same
    /// key is already in flight.
    pub fn try_acquire(&mut self, key: &EntryKey) -> bool {
        self.in_flight.insert(key.clone())
    }

    /// Frees the key. Releasing a key that is not held is a no-op.
    pub fn release(&mut self, key: &EntryKey) {
        self.in_flight.remove(key);
    }

    pub fn is_pending(&self, key: &EntryKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EntryKey> {
        self.in_flight.iter()
    }
}
