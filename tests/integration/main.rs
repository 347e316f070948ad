//! Integration tests for the bamfq binary.
//!
//! Each test writes a BAM with noodles, runs the built `bamfq` executable on it
//! and checks the FASTQ it produces.

mod helpers;
mod test_fastq_command;
mod test_library_pipeline;
