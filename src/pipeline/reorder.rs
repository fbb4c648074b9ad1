use std::collections::BTreeMap;

use crate::foundation::error::FailureReason;

/// Restores submission order for results that may complete out of order.
///
/// Items are keyed by a dense sequence number starting at 0; `pop_ready` yields them strictly in
/// sequence, holding back anything that arrived ahead of a gap.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next: u64,
    pending: BTreeMap<u64, T>,
    peak: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    /// Empty buffer expecting sequence 0 first.
    pub fn new() -> Self {
        Self {
            next: 0,
            pending: BTreeMap::new(),
            peak: 0,
        }
    }

    /// Next sequence number `pop_ready` will yield.
    pub fn next_seq(&self) -> u64 {
        self.next
    }

    /// Items held back.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Return `true` when nothing is held back.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Largest number of items held back at once.
    pub fn peak(&self) -> usize {
        self.peak
    }

    /// Store the item for `seq`. Stale or duplicate sequence numbers are rejected.
    pub fn insert(&mut self, seq: u64, item: T) -> Result<(), FailureReason> {
        if seq < self.next || self.pending.contains_key(&seq) {
            return Err(FailureReason::Internal(format!(
                "duplicate result for frame sequence {seq}"
            )));
        }
        self.pending.insert(seq, item);
        self.peak = self.peak.max(self.pending.len());
        Ok(())
    }

    /// Take the next in-order item, if it has arrived.
    pub fn pop_ready(&mut self) -> Option<(u64, T)> {
        let item = self.pending.remove(&self.next)?;
        let seq = self.next;
        self.next += 1;
        Some((seq, item))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/reorder.rs"]
mod tests;
