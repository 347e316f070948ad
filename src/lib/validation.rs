//! Input validation utilities
//!
//! Validation of command-line parameters and file paths with consistent error
//! messages. All functions return structured errors from [`crate::errors`].

use crate::errors::{BamfqError, Result};
use std::fmt::Display;
use std::path::Path;

/// Extensions accepted for FASTQ output files.
pub const FASTQ_EXTENSIONS: [&str; 4] = [".fq", ".fastq", ".fq.gz", ".fastq.gz"];

/// Validate that a file exists
///
/// # Example
/// ```
/// use bamfq_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.bam", "Input BAM");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(BamfqError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that a FASTQ output path has a recognised extension
/// (`.fq`, `.fastq`, `.fq.gz` or `.fastq.gz`).
///
/// # Example
/// ```
/// use bamfq_lib::validation::validate_fastq_filename;
///
/// validate_fastq_filename("reads_R1.fastq.gz").unwrap();
/// assert!(validate_fastq_filename("reads.txt").is_err());
/// ```
pub fn validate_fastq_filename<P: AsRef<Path>>(path: P) -> Result<()> {
    let path_ref = path.as_ref();
    let name = path_ref.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    if FASTQ_EXTENSIONS.iter().any(|ext| name.len() > ext.len() && name.ends_with(ext)) {
        return Ok(());
    }
    Err(BamfqError::InvalidFileFormat {
        file_type: "FASTQ".to_string(),
        path: path_ref.display().to_string(),
        reason: format!("File name must end with one of {}", FASTQ_EXTENSIONS.join(", ")),
    })
}

/// Validate that a value is positive (> 0)
///
/// # Example
/// ```
/// use bamfq_lib::validation::validate_positive;
///
/// validate_positive(10, "max-records-in-ram").unwrap();
/// assert!(validate_positive(0, "max-records-in-ram").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(BamfqError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Parse a distance in bases.
///
/// Accepts plain integers, optionally with thousands separators (`5,000`), and
/// decimal values with a case-insensitive unit suffix: `b`/`bp`, `k`/`kb`,
/// `m`/`mb`, `g`/`gb`. The result must be a whole number of bases.
///
/// # Example
/// ```
/// use bamfq_lib::validation::parse_distance;
///
/// assert_eq!(parse_distance("5000").unwrap(), 5000);
/// assert_eq!(parse_distance("5,000").unwrap(), 5000);
/// assert_eq!(parse_distance("2.5kb").unwrap(), 2500);
/// assert_eq!(parse_distance("1M").unwrap(), 1_000_000);
/// assert!(parse_distance("-1").is_err());
/// ```
pub fn parse_distance(value: &str) -> Result<u64> {
    let invalid = |reason: &str| BamfqError::InvalidParameter {
        parameter: "distance".to_string(),
        reason: format!("{reason}, got: '{value}'"),
    };

    let normalized: String =
        value.trim().chars().filter(|c| *c != ',' && *c != '_').collect::<String>().to_lowercase();

    let (number, multiplier) = [
        ("gb", 1_000_000_000u64),
        ("mb", 1_000_000),
        ("kb", 1_000),
        ("bp", 1),
        ("g", 1_000_000_000),
        ("m", 1_000_000),
        ("k", 1_000),
        ("b", 1),
    ]
    .iter()
    .find_map(|(suffix, mult)| normalized.strip_suffix(suffix).map(|n| (n.trim(), *mult)))
    .unwrap_or((normalized.as_str(), 1));

    if number.is_empty() {
        return Err(invalid("Expected a number of bases"));
    }

    if let Ok(whole) = number.parse::<u64>() {
        return whole.checked_mul(multiplier).ok_or_else(|| invalid("Distance is too large"));
    }

    let decimal: f64 = number.parse().map_err(|_| invalid("Expected a number of bases"))?;
    if !decimal.is_finite() || decimal < 0.0 {
        return Err(invalid("Distance must be a non-negative number"));
    }
    let bases = decimal * multiplier as f64;
    if bases.fract() != 0.0 {
        return Err(invalid("Distance must be a whole number of bases"));
    }
    if bases > u64::MAX as f64 {
        return Err(invalid("Distance is too large"));
    }
    Ok(bases as u64)
}
