//! The streaming matcher and post-spill resolution.

use std::iter::Peekable;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use log::{debug, info};

use crate::errors::BamfqError;
use crate::grouper::group_by_name;
use crate::logging::{OperationTimer, format_count};
use crate::pairing::window::Window;
use crate::pairing::{PairingOptions, PairingStats};
use crate::progress::ProgressTracker;
use crate::record::Record;
use crate::sink::{OutputRouter, PairSink};
use crate::sort::SpillSorter;

/// Single-pass pairing state for one run.
///
/// Built by [`process`](crate::pairing::process), which validates the header and
/// options first; [`Matcher::run`] consumes the matcher.
pub struct Matcher<S: PairSink> {
    distance: u64,
    window: Window,
    spill: SpillSorter,
    router: OutputRouter<S>,
    cancel: Option<Arc<AtomicBool>>,
    progress: ProgressTracker,
    stats: PairingStats,
}

impl<S: PairSink> Matcher<S> {
    pub fn new(sink: S, options: &PairingOptions) -> Self {
        let spill = SpillSorter::new(options.max_records_in_ram)
            .temp_dirs(options.temp_dirs.clone())
            .temp_compression(options.temp_compression)
            .threads(options.threads);

        Self {
            distance: options.distance,
            window: Window::new(),
            spill,
            router: OutputRouter::new(sink),
            cancel: options.cancel.clone(),
            progress: ProgressTracker::new("Read"),
            stats: PairingStats::default(),
        }
    }

    /// Pair every record of `records`, then resolve the spill and finish the sink.
    pub fn run<I>(mut self, records: I) -> Result<PairingStats>
    where
        I: IntoIterator<Item = Result<Record>>,
    {
        let timer = OperationTimer::new("Pairing reads");
        let mut input = records.into_iter().peekable();

        loop {
            self.check_cancelled()?;
            let Some(record) = input.next() else { break };
            let record = record?;
            self.observe(&record);
            self.accept(record, &mut input)?;
        }
        self.progress.log_final();

        for record in self.window.drain() {
            self.stats.spilled_flushed += 1;
            self.spill.push(record)?;
        }

        let Self { spill, mut router, mut stats, .. } = self;
        let spill_stats = spill.stats();
        stats.spill_chunks = spill_stats.chunks_written;
        if spill_stats.records_pushed > 0 {
            info!(
                "Resolving {} records left unpaired in memory ({} spill partitions)",
                format_count(spill_stats.records_pushed),
                spill_stats.chunks_written
            );
        }

        for group in group_by_name(spill.finish()?) {
            if resolve_group(&mut router, group?)? {
                stats.pairs_by_spill += 1;
            }
        }

        let counts = router.finish()?;
        stats.singles = counts.singles;
        stats.pairs = counts.pairs;
        stats.orphans = counts.orphans;
        debug_assert!(stats.is_conserved());

        timer.log_completion(stats.records_read);
        Ok(stats)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(BamfqError::Cancelled { records_read: self.stats.records_read }.into());
        }
        Ok(())
    }

    fn observe(&mut self, record: &Record) {
        self.stats.records_read += 1;
        self.progress.record(record);
    }

    /// Route or store one input record. `input` is positioned after `record`.
    fn accept<I>(&mut self, record: Record, input: &mut Peekable<I>) -> Result<()>
    where
        I: Iterator<Item = Result<Record>>,
    {
        if record.is_secondary_or_supplementary() {
            self.stats.secondary_or_supplementary += 1;
            return Ok(());
        }
        if !record.is_paired() {
            return self.router.single(record);
        }

        if record.is_unmapped() || record.is_mate_unmapped() {
            let next =
                input.next_if(|next| next.as_ref().is_ok_and(|n| record.is_primary_mate(n)));
            if let Some(Ok(mate)) = next {
                self.observe(&mate);
                self.stats.pairs_by_lookahead += 1;
                self.router.mates(record, mate)?;
                return Ok(());
            }
        }

        if self.needs_spill(&record) {
            self.stats.spilled_direct += 1;
            return self.spill.push(record);
        }

        while let Some(expired) =
            self.window.pop_expired(record.reference_name(), record.alignment_start(), self.distance)
        {
            self.stats.spilled_evicted += 1;
            self.spill.push(expired)?;
        }

        if record.alignment_start() < record.mate_alignment_start() {
            self.window.insert(record);
            return Ok(());
        }

        match self.window.take_mate(&record) {
            Some(mate) => {
                if self.router.mates(mate, record)? {
                    self.stats.pairs_by_window += 1;
                }
                Ok(())
            }
            None => {
                debug!("No mate in window for {}", record.name_bstr());
                self.stats.unmatched_in_window += 1;
                self.router.orphan(record)
            }
        }
    }

    /// True if the mate of `record` cannot be found within the window.
    fn needs_spill(&self, record: &Record) -> bool {
        record.is_unmapped()
            || record.is_mate_unmapped()
            || !record.mate_on_same_reference()
            || u64::from(record.insert_size().unsigned_abs()) > self.distance
    }
}

/// Route one name group from the spill. Returns true if it was routed as a pair.
fn resolve_group<S: PairSink>(router: &mut OutputRouter<S>, group: Vec<Record>) -> Result<bool> {
    match <[Record; 2]>::try_from(group) {
        Ok([a, b]) => router.mates(a, b),
        Err(group) => {
            for record in group {
                router.orphan(record)?;
            }
            Ok(false)
        }
    }
}
