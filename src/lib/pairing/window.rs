//! The in-memory window of first-seen mates.

use std::collections::VecDeque;

use crate::record::Record;

/// First-seen mates waiting for their partner, ordered by alignment start.
///
/// Records with equal starts keep their arrival order. Eviction keeps every record in
/// the window on the reference of the most recently inserted one.
#[derive(Debug, Default)]
pub struct Window {
    records: VecDeque<Record>,
}

impl Window {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert `record` after every record starting at or before it.
    pub fn insert(&mut self, record: Record) {
        let start = record.alignment_start();
        let index = self.records.partition_point(|r| r.alignment_start() <= start);
        self.records.insert(index, record);
    }

    /// Remove the front record if it lies on a reference other than `reference`, or
    /// starts more than `distance` bases before `start`.
    pub fn pop_expired(
        &mut self,
        reference: Option<&[u8]>,
        start: i64,
        distance: u64,
    ) -> Option<Record> {
        let front = self.records.front()?;
        let other_contig = front.reference_name() != reference;
        let too_far = start.saturating_sub(front.alignment_start()) > distance_as_i64(distance);
        if other_contig || too_far { self.records.pop_front() } else { None }
    }

    /// Remove and return the first record named like `record`.
    ///
    /// The scan gives up at the first record starting after the mate start of `record`.
    pub fn take_mate(&mut self, record: &Record) -> Option<Record> {
        let mate_start = record.mate_alignment_start();
        let mut found = None;
        for (i, candidate) in self.records.iter().enumerate() {
            if candidate.name() == record.name() {
                found = Some(i);
                break;
            }
            if candidate.alignment_start() > mate_start {
                break;
            }
        }
        found.and_then(|i| self.records.remove(i))
    }

    /// Remove every record, in window order.
    pub fn drain(&mut self) -> impl Iterator<Item = Record> + '_ {
        self.records.drain(..)
    }
}

fn distance_as_i64(distance: u64) -> i64 {
    i64::try_from(distance).unwrap_or(i64::MAX)
}
