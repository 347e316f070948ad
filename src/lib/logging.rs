//! Logging utilities for formatted output.
//!
//! Consistent formatting of counts, durations and rates, plus the run summary
//! logged at the end of a pairing run.

use std::time::{Duration, Instant};

use crate::pairing::PairingStats;

/// Formats a count with thousands separators.
///
/// # Examples
///
/// ```
/// use bamfq_lib::logging::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i).is_multiple_of(3) {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Formats a fraction (0.0-1.0) as a percentage with `decimals` decimal places.
///
/// # Examples
///
/// ```
/// use bamfq_lib::logging::format_percent;
///
/// assert_eq!(format_percent(0.9543, 2), "95.43%");
/// assert_eq!(format_percent(1.0, 0), "100%");
/// ```
#[must_use]
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.decimals$}%", value * 100.0, decimals = decimals)
}

/// Formats a duration in human-readable form ("45s", "2m 15s", "1h 30m").
///
/// # Examples
///
/// ```
/// use bamfq_lib::logging::format_duration;
/// use std::time::Duration;
///
/// assert_eq!(format_duration(Duration::from_secs(135)), "2m 15s");
/// ```
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    match secs {
        0..60 => format!("{secs}s"),
        60..3600 => match (secs / 60, secs % 60) {
            (mins, 0) => format!("{mins}m"),
            (mins, rem) => format!("{mins}m {rem}s"),
        },
        _ => match (secs / 3600, (secs % 3600) / 60) {
            (hours, 0) => format!("{hours}h"),
            (hours, mins) => format!("{hours}h {mins}m"),
        },
    }
}

/// Formats a processing rate in records per second, or per minute below one per second.
///
/// # Examples
///
/// ```
/// use bamfq_lib::logging::format_rate;
/// use std::time::Duration;
///
/// assert_eq!(format_rate(1000, Duration::from_secs(1)), "1,000 records/s");
/// assert_eq!(format_rate(30, Duration::from_secs(60)), "30.0 records/min");
/// ```
#[must_use]
pub fn format_rate(count: u64, duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 0.001 {
        return format!("{} records/s", format_count(count));
    }

    let rate = count as f64 / secs;
    if rate >= 1.0 {
        format!("{} records/s", format_count(rate as u64))
    } else {
        format!("{:.1} records/min", rate * 60.0)
    }
}

/// Logs the routing breakdown of a pairing run.
pub fn log_pairing_summary(stats: &PairingStats) {
    let share = |n: u64| {
        if stats.records_read == 0 {
            String::new()
        } else {
            format!(" ({})", format_percent(n as f64 / stats.records_read as f64, 2))
        }
    };

    log::info!("Pairing Summary:");
    log::info!("  Input records: {}", format_count(stats.records_read));
    log::info!(
        "  Secondary/supplementary (dropped): {}",
        format_count(stats.secondary_or_supplementary)
    );
    log::info!("  Single-end: {}{}", format_count(stats.singles), share(stats.singles));
    log::info!("  Paired: {} pairs{}", format_count(stats.pairs), share(2 * stats.pairs));
    log::info!("    by lookahead: {}", format_count(stats.pairs_by_lookahead));
    log::info!("    in window: {}", format_count(stats.pairs_by_window));
    log::info!("    after spill: {}", format_count(stats.pairs_by_spill));
    log::info!("  Unpaired: {}{}", format_count(stats.orphans), share(stats.orphans));

    if stats.spilled() > 0 {
        log::info!(
            "  Spilled: {} ({} direct, {} evicted, {} flushed) in {} partition(s)",
            format_count(stats.spilled()),
            format_count(stats.spilled_direct),
            format_count(stats.spilled_evicted),
            format_count(stats.spilled_flushed),
            stats.spill_chunks
        );
    }
    if stats.unmatched_in_window > 0 {
        log::info!(
            "Found no mate in memory for {} records whose mate should precede them.",
            format_count(stats.unmatched_in_window)
        );
    }
}

/// Operation timing and summary helper.
///
/// # Examples
///
/// ```no_run
/// use bamfq_lib::logging::OperationTimer;
///
/// let timer = OperationTimer::new("Pairing reads");
/// // ... do work ...
/// timer.log_completion(10_000);
/// ```
pub struct OperationTimer {
    operation: String,
    start_time: Instant,
}

impl OperationTimer {
    /// Creates a new operation timer and logs the start.
    #[must_use]
    pub fn new(operation: &str) -> Self {
        log::info!("{operation} ...");
        Self { operation: operation.to_string(), start_time: Instant::now() }
    }

    /// Logs the completion with record count and rate.
    pub fn log_completion(&self, count: u64) {
        let duration = self.start_time.elapsed();
        log::info!(
            "{} completed: {} records in {} ({})",
            self.operation,
            format_count(count),
            format_duration(duration),
            format_rate(count, duration)
        );
    }
}
