//! Shared BAM builders and FASTQ readers for the integration tests.

pub mod assertions;

pub use assertions::*;
pub use bam_generator::*;
