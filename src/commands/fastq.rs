//! Convert a coordinate-sorted BAM to paired FASTQ.
//!
//! Mates are paired in memory when they lie close together and through a
//! name-sorted spill to disk otherwise, so memory stays bounded for any input size.

use anyhow::Result;
use bamfq_lib::bam_io::{BamRecords, create_bam_reader, input_header, is_stdin_path};
use bamfq_lib::fastq::{FastqPaths, FastqSink};
use bamfq_lib::logging::log_pairing_summary;
use bamfq_lib::pairing::{DEFAULT_DISTANCE, PairingOptions, process};
use bamfq_lib::sort::{DEFAULT_MAX_RECORDS_IN_RAM, DEFAULT_TEMP_COMPRESSION};
use bamfq_lib::validation::{parse_distance, validate_file_exists, validate_positive};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

use crate::commands::command::Command;

/// Convert a coordinate-sorted BAM to paired FASTQ.
#[derive(Debug, Parser)]
#[command(
    name = "fastq",
    about = "\x1b[38;5;72m[CONVERSION]\x1b[0m     \x1b[36mConvert coordinate-sorted BAM to paired FASTQ\x1b[0m",
    long_about = r#"
Convert a coordinate-sorted BAM file to paired FASTQ using bounded memory.

Mates lying within --distance bases of each other on the same reference are
paired in memory. All other mates (unmapped, on different references, or far
apart) are sorted by name on disk and paired afterwards. Secondary and
supplementary alignments are skipped.

Reverse-strand reads are reverse-complemented back to their sequenced
orientation. Reads without qualities get '#' for every base.

OUTPUTS:

  --forward/--R1 only       pairs are interleaved into one file
  --forward and --reverse   first and second mates go to separate files
  neither                   pairs are interleaved to stdout
  --single/--R0             single-end reads (discarded when unset)
  --unpaired/-U             reads whose mate was not found (discarded when unset)

Output files ending in .gz are gzip-compressed.

EXAMPLES:

  # Split pairs into two gzipped files, keeping orphans
  bamfq fastq -i aligned.bam --R1 out_R1.fq.gz --R2 out_R2.fq.gz -U orphans.fq.gz

  # Interleaved to stdout for an aligner, larger in-memory window
  bamfq fastq -i aligned.bam -d 10kb | bwa mem -p ref.fa -
"#
)]
pub struct Fastq {
    /// Input coordinate-sorted BAM file, or '-' for stdin.
    #[arg(short = 'i', long = "input", default_value = "-")]
    pub input: PathBuf,

    /// Save single-end reads to this file.
    #[arg(long = "single", visible_alias = "R0")]
    pub single: Option<PathBuf>,

    /// Save first-of-pair reads to this file [default: stdout].
    #[arg(long = "forward", visible_alias = "R1")]
    pub forward: Option<PathBuf>,

    /// Save second-of-pair reads to this file [default: interleaved with --forward].
    #[arg(long = "reverse", visible_alias = "R2", requires = "forward")]
    pub reverse: Option<PathBuf>,

    /// Save reads whose mate could not be found to this file.
    #[arg(short = 'U', long = "unpaired")]
    pub unpaired: Option<PathBuf>,

    /// Pair mates in memory when they lie within this distance (e.g. 5000, 5kb, 1.5M).
    #[arg(short = 'd', long = "distance", default_value_t = DEFAULT_DISTANCE, value_parser = parse_distance_arg)]
    pub distance: u64,

    /// Maximum records held in memory before spilling to disk.
    #[arg(long = "max-records-in-ram", default_value_t = DEFAULT_MAX_RECORDS_IN_RAM)]
    pub max_records_in_ram: usize,

    /// Directory for temporary files; may be given more than once [default: system temp].
    #[arg(short = 'T', long = "tmp-dir")]
    pub tmp_dir: Vec<PathBuf>,

    /// Compression level for temporary files (0 = uncompressed).
    #[arg(long = "temp-compression", default_value_t = DEFAULT_TEMP_COMPRESSION)]
    pub temp_compression: u32,

    /// Number of threads for BAM decompression and sorting.
    #[arg(short = '@', short_alias = 't', long = "threads", default_value = "1")]
    pub threads: usize,

    /// Append /1 and /2 to the names of first and second mates.
    #[arg(long = "read-suffix", default_value = "false")]
    pub read_suffix: bool,
}

fn parse_distance_arg(s: &str) -> Result<u64, String> {
    parse_distance(s).map_err(|e| e.to_string())
}

fn describe(path: Option<&Path>, unset: &str) -> String {
    path.map_or_else(|| unset.to_string(), |p| p.display().to_string())
}

impl Command for Fastq {
    fn execute(&self, _command_line: &str) -> Result<()> {
        if !is_stdin_path(&self.input) {
            validate_file_exists(&self.input, "Input BAM")?;
        }
        validate_positive(self.max_records_in_ram, "max-records-in-ram")?;
        validate_positive(self.threads, "threads")?;

        info!("Input: {}", self.input.display());
        info!("R0 (single-end): {}", describe(self.single.as_deref(), "discarded"));
        info!("R1: {}", describe(self.forward.as_deref(), "stdout"));
        info!("R2: {}", describe(self.reverse.as_deref(), "interleaved with R1"));
        info!("Unpaired: {}", describe(self.unpaired.as_deref(), "discarded"));
        info!("Distance: {} bases", self.distance);
        info!("Max records in RAM: {}", self.max_records_in_ram);
        if !self.tmp_dir.is_empty() {
            let dirs: Vec<String> = self.tmp_dir.iter().map(|d| d.display().to_string()).collect();
            info!("Temp directories: {}", dirs.join(", "));
        }
        info!("Threads: {}", self.threads);

        let (reader, header) = create_bam_reader(&self.input, self.threads)?;
        let input = input_header(&header);
        input.ensure_coordinate_sorted()?;

        let paths = FastqPaths {
            single: self.single.clone(),
            forward: self.forward.clone(),
            reverse: self.reverse.clone(),
            unpaired: self.unpaired.clone(),
        };
        let sink = FastqSink::from_paths(&paths, self.read_suffix)?;

        let options = PairingOptions::new()
            .distance(self.distance)
            .max_records_in_ram(self.max_records_in_ram)
            .temp_dirs(self.tmp_dir.clone())
            .temp_compression(self.temp_compression)
            .threads(self.threads);

        let stats = process(&input, BamRecords::new(reader, header), sink, &options)?;
        log_pairing_summary(&stats);
        Ok(())
    }
}
