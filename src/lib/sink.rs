//! Output routing for resolved records.
//!
//! The pairing engine never writes output itself. Every record ends up in exactly one
//! call on a [`PairSink`], made through an [`OutputRouter`] that counts what it routed.

use anyhow::Result;

use crate::record::{Record, order_mates};

/// Destination for the three output classes of the pairing engine.
///
/// Any error returned by a sink aborts the run and is propagated unchanged.
pub trait PairSink {
    /// Receive a record that is not part of a paired template.
    fn write_single(&mut self, record: Record) -> Result<()>;

    /// Receive both mates of a template, first-of-pair first.
    fn write_pair(&mut self, first: Record, second: Record) -> Result<()>;

    /// Receive a paired record whose mate could not be found.
    fn write_orphan(&mut self, record: Record) -> Result<()>;

    /// Flush buffered output. Called once after the last record has been routed.
    fn finish(&mut self) -> Result<()>;
}

impl<S: PairSink + ?Sized> PairSink for &mut S {
    fn write_single(&mut self, record: Record) -> Result<()> {
        (**self).write_single(record)
    }

    fn write_pair(&mut self, first: Record, second: Record) -> Result<()> {
        (**self).write_pair(first, second)
    }

    fn write_orphan(&mut self, record: Record) -> Result<()> {
        (**self).write_orphan(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

impl<S: PairSink + ?Sized> PairSink for Box<S> {
    fn write_single(&mut self, record: Record) -> Result<()> {
        (**self).write_single(record)
    }

    fn write_pair(&mut self, first: Record, second: Record) -> Result<()> {
        (**self).write_pair(first, second)
    }

    fn write_orphan(&mut self, record: Record) -> Result<()> {
        (**self).write_orphan(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Number of routing calls made per output class.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutingCounts {
    /// Records routed as single-end.
    pub singles: u64,
    /// Pairs routed (each containing two records).
    pub pairs: u64,
    /// Records routed as orphans.
    pub orphans: u64,
}

impl RoutingCounts {
    /// Total number of records routed.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.singles + 2 * self.pairs + self.orphans
    }
}

/// Dispatches dispositions to a [`PairSink`], counting each class.
pub struct OutputRouter<S: PairSink> {
    sink: S,
    counts: RoutingCounts,
}

impl<S: PairSink> OutputRouter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink, counts: RoutingCounts::default() }
    }

    #[must_use]
    pub fn counts(&self) -> RoutingCounts {
        self.counts
    }

    pub fn single(&mut self, record: Record) -> Result<()> {
        self.counts.singles += 1;
        self.sink.write_single(record)
    }

    /// Route two mates already ordered first-of-pair first.
    pub fn pair(&mut self, first: Record, second: Record) -> Result<()> {
        self.counts.pairs += 1;
        self.sink.write_pair(first, second)
    }

    /// Route two records with the same name as a pair when their flags are
    /// complementary, or as two orphans otherwise.
    ///
    /// Returns true if the records were routed as a pair.
    pub fn mates(&mut self, a: Record, b: Record) -> Result<bool> {
        match order_mates(a, b) {
            Ok((first, second)) => {
                self.pair(first, second)?;
                Ok(true)
            }
            Err((a, b)) => {
                self.orphan(a)?;
                self.orphan(b)?;
                Ok(false)
            }
        }
    }

    pub fn orphan(&mut self, record: Record) -> Result<()> {
        self.counts.orphans += 1;
        self.sink.write_orphan(record)
    }

    /// Finish the sink and return the final counts.
    pub fn finish(mut self) -> Result<RoutingCounts> {
        self.sink.finish()?;
        Ok(self.counts)
    }
}

/// A sink that keeps every routed record in memory.
#[derive(Default, Debug)]
pub struct CollectingSink {
    pub singles: Vec<Record>,
    pub pairs: Vec<(Record, Record)>,
    pub orphans: Vec<Record>,
    /// Set once [`PairSink::finish`] has been called.
    pub finished: bool,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.singles.len() + 2 * self.pairs.len() + self.orphans.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PairSink for CollectingSink {
    fn write_single(&mut self, record: Record) -> Result<()> {
        self.singles.push(record);
        Ok(())
    }

    fn write_pair(&mut self, first: Record, second: Record) -> Result<()> {
        self.pairs.push((first, second));
        Ok(())
    }

    fn write_orphan(&mut self, record: Record) -> Result<()> {
        self.orphans.push(record);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
