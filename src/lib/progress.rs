//! Progress logging for record streams.

use std::time::Instant;

use log::info;

use crate::logging::{format_count, format_duration};
use crate::record::Record;

/// Logs a progress line every `interval` records, including the position of the
/// last record seen.
///
/// # Example
/// ```
/// use bamfq_lib::progress::ProgressTracker;
/// use bamfq_lib::record::RecordBuilder;
///
/// let mut tracker = ProgressTracker::new("Read").with_interval(100);
/// let record = RecordBuilder::new("q1").reference("chr1", 1000).build();
///
/// for _ in 0..250 {
///     tracker.record(&record); // Logs at 100 and 200
/// }
/// tracker.log_final(); // Logs "Read 250 records (complete)"
/// assert_eq!(tracker.count(), 250);
/// ```
pub struct ProgressTracker {
    verb: String,
    interval: u64,
    count: u64,
    start: Instant,
    last_milestone: Instant,
}

impl ProgressTracker {
    /// Create a tracker that logs every 1,000,000 records.
    #[must_use]
    pub fn new(verb: impl Into<String>) -> Self {
        let now = Instant::now();
        Self { verb: verb.into(), interval: 1_000_000, count: 0, start: now, last_milestone: now }
    }

    /// Set the logging interval (values below 1 are treated as 1).
    #[must_use]
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval.max(1);
        self
    }

    /// Count one record, logging if an interval boundary was reached.
    ///
    /// Returns true if a progress line was logged.
    pub fn record(&mut self, record: &Record) -> bool {
        self.count += 1;
        if !self.count.is_multiple_of(self.interval) {
            return false;
        }

        let now = Instant::now();
        let position = match record.reference_name() {
            Some(name) => format!(
                "{}:{}",
                String::from_utf8_lossy(name),
                format_count(u64::try_from(record.alignment_start()).unwrap_or(0))
            ),
            None => "*/*".to_string(),
        };
        info!(
            "{} {} records. Elapsed time: {}, time for last {}: {}. Last read position: {}",
            self.verb,
            format_count(self.count),
            format_duration(now - self.start),
            format_count(self.interval),
            format_duration(now - self.last_milestone),
            position
        );
        self.last_milestone = now;
        true
    }

    /// Log the final count unless it was just logged at an interval boundary.
    pub fn log_final(&self) {
        if self.count > 0 && !self.count.is_multiple_of(self.interval) {
            info!("{} {} records (complete)", self.verb, format_count(self.count));
        }
    }

    /// Number of records counted so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }
}
