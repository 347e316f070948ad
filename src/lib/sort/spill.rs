//! Bounded-memory external sort of records by template name.
//!
//! # Algorithm
//!
//! 1. **Accumulate phase**: Buffer pushed records until `max_records_in_ram` is reached
//! 2. **Sort phase**: Sort the buffer by (name, arrival ordinal), in parallel with rayon
//!    when more than one thread is configured
//! 3. **Spill phase**: Write the sorted buffer to a partition in a temp directory
//! 4. **Merge phase**: K-way merge of all partitions plus the in-memory remainder using
//!    a binary heap
//!
//! The arrival ordinal makes the output deterministic: records with equal names come
//! back in the order they were pushed.
//!
//! Partitions live in [`TempDir`]s owned first by the [`SpillSorter`] and then by the
//! [`MergedRecords`] it finishes into, so they are removed when the merge is exhausted
//! or when either value is dropped, including while unwinding from an error.

use crate::record::Record;
use crate::sort::chunk::{Chunk, ChunkReader, ChunkWriter};
use anyhow::{Context, Result};
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default maximum number of records held in memory before spilling.
pub const DEFAULT_MAX_RECORDS_IN_RAM: usize = 500_000;

/// Compression level for temporary partitions (fast compression).
pub const DEFAULT_TEMP_COMPRESSION: u32 = 1;

/// Accumulates records and yields them back ordered by template name.
pub struct SpillSorter {
    /// Maximum number of records buffered before a spill.
    max_records_in_ram: usize,
    /// Base directories for partitions; empty means the system temp directory.
    temp_dirs: Vec<PathBuf>,
    /// Compression level for partitions (0 = uncompressed).
    temp_compression: u32,
    /// Number of threads for the in-memory sort.
    threads: usize,
    /// In-memory accumulation tagged with arrival ordinals.
    buffer: Vec<(u64, Record)>,
    next_ordinal: u64,
    /// One lazily-created spill directory per base directory.
    spill_dirs: Vec<Option<TempDir>>,
    chunks: Vec<Chunk>,
    stats: SpillStats,
}

/// Statistics from a spill sorter.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpillStats {
    /// Records pushed into the sorter.
    pub records_pushed: u64,
    /// Partitions written to disk.
    pub chunks_written: usize,
}

impl SpillSorter {
    /// Create a sorter that keeps at most `max_records_in_ram` records in memory.
    ///
    /// A limit of zero is treated as one.
    #[must_use]
    pub fn new(max_records_in_ram: usize) -> Self {
        let max_records_in_ram = max_records_in_ram.max(1);
        Self {
            max_records_in_ram,
            temp_dirs: Vec::new(),
            temp_compression: DEFAULT_TEMP_COMPRESSION,
            threads: 1,
            buffer: Vec::with_capacity(max_records_in_ram.min(1 << 16)),
            next_ordinal: 0,
            spill_dirs: Vec::new(),
            chunks: Vec::new(),
            stats: SpillStats::default(),
        }
    }

    /// Set the base directories for partitions; partitions are spread round-robin.
    #[must_use]
    pub fn temp_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.temp_dirs = dirs;
        self
    }

    /// Set the compression level of partitions (0 = uncompressed).
    #[must_use]
    pub fn temp_compression(mut self, level: u32) -> Self {
        self.temp_compression = level;
        self
    }

    /// Set the number of threads used to sort each buffer.
    #[must_use]
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    #[must_use]
    pub fn stats(&self) -> SpillStats {
        self.stats
    }

    /// Take ownership of `record`, spilling the buffer to disk if it is full.
    pub fn push(&mut self, record: Record) -> Result<()> {
        self.buffer.push((self.next_ordinal, record));
        self.next_ordinal += 1;
        self.stats.records_pushed += 1;

        if self.buffer.len() >= self.max_records_in_ram {
            self.spill()?;
        }
        Ok(())
    }

    /// Stop accepting records and return every pushed record ordered by name.
    pub fn finish(mut self) -> Result<MergedRecords> {
        self.sort_buffer();
        let buffer = std::mem::take(&mut self.buffer);
        let spill_dirs: Vec<TempDir> = self.spill_dirs.drain(..).flatten().collect();

        if self.chunks.is_empty() {
            debug!("All {} spilled records fit in memory", buffer.len());
            return Ok(MergedRecords {
                state: MergeState::InMemory(buffer.into_iter()),
                spill_dirs,
                yielded: 0,
            });
        }

        info!(
            "Merging {} spill partitions and {} in-memory records",
            self.chunks.len(),
            buffer.len()
        );

        let mut sources: Vec<ChunkSource> = Vec::with_capacity(self.chunks.len() + 1);
        for chunk in &self.chunks {
            sources.push(ChunkSource::Disk(ChunkReader::open(chunk)?));
        }
        if !buffer.is_empty() {
            sources.push(ChunkSource::Memory(buffer.into_iter()));
        }

        // Initialize heap with first record from each source
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, chunk_source) in sources.iter_mut().enumerate() {
            if let Some((ordinal, record)) = chunk_source.next_entry()? {
                heap.push(Reverse(HeapEntry { ordinal, record, source }));
            }
        }

        Ok(MergedRecords { state: MergeState::Merging { sources, heap }, spill_dirs, yielded: 0 })
    }

    fn sort_buffer(&mut self) {
        if self.threads > 1 {
            self.buffer.par_sort_unstable_by(by_name_then_ordinal);
        } else {
            self.buffer.sort_unstable_by(by_name_then_ordinal);
        }
    }

    /// Sort the buffer and write it to a new partition.
    fn spill(&mut self) -> Result<()> {
        self.sort_buffer();

        let index = self.chunks.len();
        let dir = self.spill_dir(index)?;
        let path = dir.join(format!("chunk_{index:04}.spill"));

        let mut writer = ChunkWriter::create(&path, self.temp_compression)?;
        for (ordinal, record) in self.buffer.drain(..) {
            writer.write_entry(ordinal, &record)?;
        }
        let chunk = writer.finish()?;

        debug!("Spilled {} records to {}", chunk.records, chunk.path.display());
        self.chunks.push(chunk);
        self.stats.chunks_written += 1;
        Ok(())
    }

    /// Directory for partition `index`, creating it on first use.
    fn spill_dir(&mut self, index: usize) -> Result<PathBuf> {
        let slots = self.temp_dirs.len().max(1);
        if self.spill_dirs.len() < slots {
            self.spill_dirs.resize_with(slots, || None);
        }

        let slot = index % slots;
        if let Some(dir) = &self.spill_dirs[slot] {
            return Ok(dir.path().to_path_buf());
        }

        let dir = match self.temp_dirs.get(slot) {
            Some(base) => create_spill_dir_in(base)?,
            None => TempDir::new().context("Failed to create temp directory")?,
        };
        let path = dir.path().to_path_buf();
        self.spill_dirs[slot] = Some(dir);
        Ok(path)
    }
}

fn create_spill_dir_in(base: &Path) -> Result<TempDir> {
    std::fs::create_dir_all(base)
        .with_context(|| format!("Failed to create temp directory: {}", base.display()))?;
    TempDir::new_in(base)
        .with_context(|| format!("Failed to create temp directory in: {}", base.display()))
}

fn by_name_then_ordinal(a: &(u64, Record), b: &(u64, Record)) -> Ordering {
    a.1.name().cmp(b.1.name()).then(a.0.cmp(&b.0))
}

/// A merge cursor: either a partition on disk or the sorted in-memory remainder.
enum ChunkSource {
    Disk(ChunkReader),
    Memory(std::vec::IntoIter<(u64, Record)>),
}

impl ChunkSource {
    fn next_entry(&mut self) -> Result<Option<(u64, Record)>> {
        match self {
            ChunkSource::Disk(reader) => {
                let entry = reader.next_entry()?;
                if entry.is_none() {
                    reader.ensure_exhausted()?;
                }
                Ok(entry)
            }
            ChunkSource::Memory(records) => Ok(records.next()),
        }
    }
}

/// Entry in the merge heap.
struct HeapEntry {
    ordinal: u64,
    record: Record,
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.record.name().cmp(other.record.name()).then(self.ordinal.cmp(&other.ordinal))
    }
}

enum MergeState {
    InMemory(std::vec::IntoIter<(u64, Record)>),
    Merging { sources: Vec<ChunkSource>, heap: BinaryHeap<Reverse<HeapEntry>> },
    Done,
}

/// The name-ordered output of a [`SpillSorter`].
///
/// Yields each pushed record exactly once. The first error ends the iteration, and
/// partitions are deleted as soon as the iterator is exhausted, fails, or is dropped.
pub struct MergedRecords {
    state: MergeState,
    spill_dirs: Vec<TempDir>,
    yielded: u64,
}

impl MergedRecords {
    /// Number of records yielded so far.
    #[must_use]
    pub fn records_yielded(&self) -> u64 {
        self.yielded
    }

    fn close(&mut self) {
        self.state = MergeState::Done;
        self.spill_dirs.clear();
    }

    fn next_merged(
        sources: &mut [ChunkSource],
        heap: &mut BinaryHeap<Reverse<HeapEntry>>,
    ) -> Option<Result<Record>> {
        let Reverse(entry) = heap.pop()?;
        match sources[entry.source].next_entry() {
            Ok(Some((ordinal, record))) => {
                heap.push(Reverse(HeapEntry { ordinal, record, source: entry.source }));
            }
            Ok(None) => {}
            Err(e) => return Some(Err(e)),
        }
        Some(Ok(entry.record))
    }
}

impl Iterator for MergedRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &mut self.state {
            MergeState::InMemory(records) => records.next().map(|(_, record)| Ok(record)),
            MergeState::Merging { sources, heap } => Self::next_merged(sources, heap),
            MergeState::Done => return None,
        };

        match next {
            Some(Ok(record)) => {
                self.yielded += 1;
                Some(Ok(record))
            }
            Some(Err(e)) => {
                self.close();
                Some(Err(e))
            }
            None => {
                self.close();
                None
            }
        }
    }
}

impl std::iter::FusedIterator for MergedRecords {}
