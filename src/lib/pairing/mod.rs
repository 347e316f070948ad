//! Read-pair reconciliation over a coordinate-sorted record stream.
//!
//! [`process`] drives three stages that agree on ordering:
//!
//! 1. **Windowed matching** ([`matcher`]): adjacent mates are paired by one-record
//!    lookahead, nearby mates on the same contig through a bounded [`window`].
//! 2. **Spill**: everything the window cannot resolve is handed to a
//!    [`SpillSorter`](crate::sort::SpillSorter) keyed by template name.
//! 3. **Post-spill resolution**: the name-ordered spill output is grouped with
//!    [`group_by_name`](crate::grouper::group_by_name) and each group is routed as a
//!    pair or as orphans.
//!
//! Every input record reaches the sink exactly once, except secondary and
//! supplementary alignments, which are counted and dropped.
//!
//! # Example
//!
//! ```
//! use bamfq_lib::pairing::{InputHeader, PairingOptions, SortOrder, process};
//! use bamfq_lib::record::RecordBuilder;
//! use bamfq_lib::sink::CollectingSink;
//!
//! # fn main() -> anyhow::Result<()> {
//! let records = vec![
//!     RecordBuilder::new("a").first_of_pair().reference("chr1", 100)
//!         .mate_reference("chr1", 150).insert_size(100).build(),
//!     RecordBuilder::new("a").second_of_pair().reference("chr1", 150)
//!         .mate_reference("chr1", 100).insert_size(-100).build(),
//! ];
//!
//! let mut sink = CollectingSink::new();
//! let header = InputHeader::new(SortOrder::Coordinate);
//! let stats = process(&header, records.into_iter().map(Ok), &mut sink, &PairingOptions::default())?;
//!
//! assert_eq!(stats.pairs, 1);
//! assert_eq!(sink.pairs.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod matcher;
pub mod window;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Result;

use crate::errors::BamfqError;
use crate::record::Record;
use crate::sink::PairSink;
use crate::sort::{DEFAULT_MAX_RECORDS_IN_RAM, DEFAULT_TEMP_COMPRESSION};

pub use matcher::Matcher;

/// Default maximum distance in bases between mates resolved in memory.
pub const DEFAULT_DISTANCE: u64 = 5000;

/// Sort order declared by the input header (`@HD SO`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    Coordinate,
    Queryname,
    Unsorted,
    /// Any other declared value, or `unknown` when the header declares none.
    Unknown(String),
}

impl SortOrder {
    /// Parse an `@HD SO` value.
    #[must_use]
    pub fn from_header_value(value: &[u8]) -> Self {
        match value {
            b"coordinate" => Self::Coordinate,
            b"queryname" => Self::Queryname,
            b"unsorted" => Self::Unsorted,
            other => Self::Unknown(String::from_utf8_lossy(other).into_owned()),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coordinate => write!(f, "coordinate"),
            Self::Queryname => write!(f, "queryname"),
            Self::Unsorted => write!(f, "unsorted"),
            Self::Unknown(value) => write!(f, "{value}"),
        }
    }
}

/// The parts of the input header the pairing engine depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputHeader {
    sort_order: SortOrder,
}

impl InputHeader {
    #[must_use]
    pub fn new(sort_order: SortOrder) -> Self {
        Self { sort_order }
    }

    #[must_use]
    pub fn sort_order(&self) -> &SortOrder {
        &self.sort_order
    }

    /// Fails with [`BamfqError::NotCoordinateSorted`] unless the header declares
    /// coordinate order.
    pub fn ensure_coordinate_sorted(&self) -> crate::errors::Result<()> {
        if self.sort_order == SortOrder::Coordinate {
            Ok(())
        } else {
            Err(BamfqError::NotCoordinateSorted { found: self.sort_order.to_string() })
        }
    }
}

/// Configuration of one pairing run.
#[derive(Debug, Clone)]
pub struct PairingOptions {
    /// Maximum |insert size| and window span, in bases.
    pub distance: u64,
    /// Records buffered by the spill sorter before writing a partition.
    pub max_records_in_ram: usize,
    /// Directories for spill partitions; empty means the system temp directory.
    pub temp_dirs: Vec<PathBuf>,
    /// BGZF level for spill partitions (0 = uncompressed).
    pub temp_compression: u32,
    /// Threads for sorting spill buffers.
    pub threads: usize,
    /// Checked between input records; a set flag aborts the run.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PairingOptions {
    fn default() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            max_records_in_ram: DEFAULT_MAX_RECORDS_IN_RAM,
            temp_dirs: Vec::new(),
            temp_compression: DEFAULT_TEMP_COMPRESSION,
            threads: 1,
            cancel: None,
        }
    }
}

impl PairingOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn distance(mut self, distance: u64) -> Self {
        self.distance = distance;
        self
    }

    #[must_use]
    pub fn max_records_in_ram(mut self, max_records: usize) -> Self {
        self.max_records_in_ram = max_records;
        self
    }

    #[must_use]
    pub fn temp_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.temp_dirs = dirs;
        self
    }

    #[must_use]
    pub fn temp_compression(mut self, level: u32) -> Self {
        self.temp_compression = level;
        self
    }

    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub fn cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Check option values that have no meaningful interpretation.
    pub fn validate(&self) -> crate::errors::Result<()> {
        if self.max_records_in_ram == 0 {
            return Err(BamfqError::InvalidParameter {
                parameter: "max-records-in-ram".to_string(),
                reason: "Must be positive (> 0), got: 0".to_string(),
            });
        }
        if self.temp_compression > 12 {
            return Err(BamfqError::InvalidParameter {
                parameter: "temp-compression".to_string(),
                reason: format!("Must be between 0 and 12, got: {}", self.temp_compression),
            });
        }
        if self.threads == 0 {
            return Err(BamfqError::InvalidParameter {
                parameter: "threads".to_string(),
                reason: "Must be positive (> 0), got: 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Counts from one pairing run.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingStats {
    /// Records consumed from the input.
    pub records_read: u64,
    /// Secondary and supplementary records, dropped without routing.
    pub secondary_or_supplementary: u64,
    /// Records routed as single-end.
    pub singles: u64,
    /// Pairs routed.
    pub pairs: u64,
    /// Records routed as orphans.
    pub orphans: u64,
    /// Pairs resolved from two adjacent input records.
    pub pairs_by_lookahead: u64,
    /// Pairs resolved inside the window.
    pub pairs_by_window: u64,
    /// Pairs resolved after the spill.
    pub pairs_by_spill: u64,
    /// Second-seen mates that found no record in the window.
    pub unmatched_in_window: u64,
    /// Records pushed to the spill without entering the window.
    pub spilled_direct: u64,
    /// Records evicted from the window into the spill.
    pub spilled_evicted: u64,
    /// Records left in the window at end of input.
    pub spilled_flushed: u64,
    /// Spill partitions written to disk.
    pub spill_chunks: usize,
}

impl PairingStats {
    /// Records pushed to the spill sorter.
    #[must_use]
    pub fn spilled(&self) -> u64 {
        self.spilled_direct + self.spilled_evicted + self.spilled_flushed
    }

    /// Records delivered to the sink.
    #[must_use]
    pub fn records_routed(&self) -> u64 {
        self.singles + 2 * self.pairs + self.orphans
    }

    /// True if every record that was not dropped has been routed exactly once.
    #[must_use]
    pub fn is_conserved(&self) -> bool {
        self.records_routed() + self.secondary_or_supplementary == self.records_read
    }
}

/// Pair every record of a coordinate-sorted stream and route it to `sink`.
///
/// Fails before reading any record if `header` does not declare coordinate order
/// or `options` are invalid. Errors from the input, the spill or the sink abort the
/// run; output already written to the sink is kept.
pub fn process<I, S>(
    header: &InputHeader,
    records: I,
    sink: S,
    options: &PairingOptions,
) -> Result<PairingStats>
where
    I: IntoIterator<Item = Result<Record>>,
    S: PairSink,
{
    options.validate()?;
    header.ensure_coordinate_sorted()?;

    Matcher::new(sink, options).run(records)
}
