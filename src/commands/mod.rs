//! CLI command implementations for bamfq.
//!
//! - [`fastq`] - Convert a coordinate-sorted BAM to paired FASTQ

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate, clippy::uninlined_format_args)]

pub mod command;
pub mod fastq;
