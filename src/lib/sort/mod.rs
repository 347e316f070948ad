//! Name-ordered external sorting of records that could not be paired in the window.
//!
//! # Architecture
//!
//! 1. **Accumulate phase**: Buffer records until the memory limit is reached
//! 2. **Sort phase**: Sort in-memory records by (name, arrival ordinal)
//! 3. **Spill phase**: Write the sorted buffer to a partition in a temp directory
//! 4. **Merge phase**: K-way merge of partitions using a min-heap
//!
//! Partition files use a private length-prefixed layout (see [`chunk`]), optionally
//! BGZF-compressed, and never outlive the run that wrote them.

pub(crate) mod chunk;
pub mod spill;

pub use spill::{
    DEFAULT_MAX_RECORDS_IN_RAM, DEFAULT_TEMP_COMPRESSION, MergedRecords, SpillSorter, SpillStats,
};
