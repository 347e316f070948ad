//! FASTQ output for paired records.
//!
//! [`FastqFormatter`] renders a [`Record`] as a four-line FASTQ entry, restoring the
//! original read orientation for reverse-strand alignments. [`FastqWriter`] writes
//! entries to a plain or gzip-compressed file, or to stdout, and [`FastqSink`] routes
//! the pairing engine's output classes to their writers.
//!
//! # Example
//!
//! ```
//! use bamfq_lib::fastq::FastqFormatter;
//! use bamfq_lib::record::RecordBuilder;
//!
//! let record = RecordBuilder::new("q1")
//!     .first_of_pair()
//!     .reverse()
//!     .sequence(b"AACG")
//!     .qualities(&[10, 20, 30, 40])
//!     .build();
//!
//! let mut out = Vec::new();
//! FastqFormatter::new(true).write(&mut out, &record).unwrap();
//! assert_eq!(out, b"@q1/1\nCGTT\n+\nI?5+\n");
//! ```

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;
use log::info;

use crate::errors::BamfqError;
use crate::logging::format_count;
use crate::record::Record;
use crate::sink::PairSink;
use crate::validation::validate_fastq_filename;

/// Phred score to Phred+33 ASCII, clamped to `~`.
static QUAL_TO_ASCII: [u8; 256] = {
    let mut table = [b'~'; 256];
    let mut q = 0;
    while q <= 93 {
        table[q] = q as u8 + 33;
        q += 1;
    }
    table
};

/// Base complement; anything that is not an unambiguous base becomes `N`.
static COMPLEMENT: [u8; 256] = {
    let mut table = [b'N'; 256];
    let pairs = [(b'A', b'T'), (b'C', b'G'), (b'G', b'C'), (b'T', b'A')];
    let mut i = 0;
    while i < pairs.len() {
        let (base, complement) = pairs[i];
        table[base as usize] = complement;
        table[base.to_ascii_lowercase() as usize] = complement;
        i += 1;
    }
    table
};

/// Quality character written when a record carries no qualities.
const MISSING_QUALITY: u8 = b'#';

const OUTPUT_BUFFER_SIZE: usize = 1024 * 1024;

/// Renders records as FASTQ entries, reusing its scratch buffers.
#[derive(Debug, Default)]
pub struct FastqFormatter {
    read_suffix: bool,
    bases: Vec<u8>,
    quals: Vec<u8>,
}

impl FastqFormatter {
    /// Create a formatter; with `read_suffix`, mates get `/1` or `/2` appended to their name.
    #[must_use]
    pub fn new(read_suffix: bool) -> Self {
        Self { read_suffix, bases: Vec::with_capacity(512), quals: Vec::with_capacity(512) }
    }

    /// Write `record` as one FASTQ entry.
    pub fn write<W: Write>(&mut self, writer: &mut W, record: &Record) -> io::Result<()> {
        self.bases.clear();
        self.bases.extend_from_slice(record.sequence());

        self.quals.clear();
        if record.qualities().is_empty() {
            self.quals.resize(self.bases.len(), MISSING_QUALITY);
        } else {
            self.quals.extend(record.qualities().iter().map(|&q| QUAL_TO_ASCII[q as usize]));
        }

        if record.is_reverse() {
            self.bases.reverse();
            for base in &mut self.bases {
                *base = COMPLEMENT[*base as usize];
            }
            self.quals.reverse();
        }

        writer.write_all(b"@")?;
        writer.write_all(record.name())?;
        writer.write_all(self.suffix(record))?;
        writer.write_all(b"\n")?;
        writer.write_all(&self.bases)?;
        writer.write_all(b"\n+\n")?;
        writer.write_all(&self.quals)?;
        writer.write_all(b"\n")
    }

    fn suffix(&self, record: &Record) -> &'static [u8] {
        if !self.read_suffix || !record.is_paired() {
            b""
        } else if record.is_first_of_pair() && !record.is_second_of_pair() {
            b"/1"
        } else if record.is_second_of_pair() && !record.is_first_of_pair() {
            b"/2"
        } else {
            b""
        }
    }
}

enum FastqOutput {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
    Stdout(BufWriter<Stdout>),
}

impl Write for FastqOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            FastqOutput::Plain(w) => w.write(buf),
            FastqOutput::Gzip(w) => w.write(buf),
            FastqOutput::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            FastqOutput::Plain(w) => w.flush(),
            FastqOutput::Gzip(w) => w.flush(),
            FastqOutput::Stdout(w) => w.flush(),
        }
    }
}

/// A FASTQ destination: a file (gzip-compressed when its name ends in `.gz`) or stdout.
pub struct FastqWriter {
    output: FastqOutput,
    formatter: FastqFormatter,
    description: String,
    records: u64,
}

impl FastqWriter {
    /// Create a FASTQ file, validating its extension first.
    pub fn create<P: AsRef<Path>>(path: P, read_suffix: bool) -> Result<Self> {
        let path = path.as_ref();
        validate_fastq_filename(path)?;

        let file = File::create(path)
            .with_context(|| format!("Failed to create FASTQ file: {}", path.display()))?;
        let buffered = BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, file);
        let output = if path.extension().is_some_and(|ext| ext == "gz") {
            FastqOutput::Gzip(GzEncoder::new(buffered, Compression::default()))
        } else {
            FastqOutput::Plain(buffered)
        };

        Ok(Self {
            output,
            formatter: FastqFormatter::new(read_suffix),
            description: path.display().to_string(),
            records: 0,
        })
    }

    /// Write FASTQ to standard output.
    #[must_use]
    pub fn stdout(read_suffix: bool) -> Self {
        Self {
            output: FastqOutput::Stdout(BufWriter::with_capacity(OUTPUT_BUFFER_SIZE, io::stdout())),
            formatter: FastqFormatter::new(read_suffix),
            description: "stdout".to_string(),
            records: 0,
        }
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        self.formatter
            .write(&mut self.output, record)
            .with_context(|| format!("Failed to write FASTQ record to {}", self.description))?;
        self.records += 1;
        Ok(())
    }

    /// Number of entries written so far.
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush all buffered output and finish the gzip stream, if any.
    pub fn finish(&mut self) -> Result<()> {
        let result = match &mut self.output {
            FastqOutput::Plain(w) => w.flush(),
            FastqOutput::Gzip(w) => w.try_finish().and_then(|()| w.get_mut().flush()),
            FastqOutput::Stdout(w) => w.flush(),
        };
        result.with_context(|| format!("Failed to finish FASTQ output: {}", self.description))?;
        info!("Wrote {} FASTQ records to {}", format_count(self.records), self.description);
        Ok(())
    }
}

/// Where resolved pairs are written.
pub enum PairedOutput {
    /// Both mates to one stream, first-of-pair first.
    Interleaved(FastqWriter),
    /// First-of-pair and second-of-pair to separate streams.
    Split { forward: FastqWriter, reverse: FastqWriter },
}

/// Output paths for [`FastqSink::from_paths`].
#[derive(Debug, Clone, Default)]
pub struct FastqPaths {
    /// Single-end reads (`--R0`); discarded when unset.
    pub single: Option<PathBuf>,
    /// First-of-pair reads (`--R1`); stdout when unset.
    pub forward: Option<PathBuf>,
    /// Second-of-pair reads (`--R2`); interleaved with `forward` when unset.
    pub reverse: Option<PathBuf>,
    /// Orphans (`-U`); discarded when unset.
    pub unpaired: Option<PathBuf>,
}

/// A [`PairSink`] writing each output class to FASTQ.
pub struct FastqSink {
    single: Option<FastqWriter>,
    unpaired: Option<FastqWriter>,
    paired: PairedOutput,
}

impl FastqSink {
    #[must_use]
    pub fn new(paired: PairedOutput) -> Self {
        Self { single: None, unpaired: None, paired }
    }

    #[must_use]
    pub fn with_single(mut self, writer: FastqWriter) -> Self {
        self.single = Some(writer);
        self
    }

    #[must_use]
    pub fn with_unpaired(mut self, writer: FastqWriter) -> Self {
        self.unpaired = Some(writer);
        self
    }

    /// Open every configured output.
    ///
    /// Fails if a reverse output is given without a forward output, or if any file
    /// name lacks a FASTQ extension.
    pub fn from_paths(paths: &FastqPaths, read_suffix: bool) -> Result<Self> {
        let paired = match (&paths.forward, &paths.reverse) {
            (None, None) => PairedOutput::Interleaved(FastqWriter::stdout(read_suffix)),
            (Some(forward), None) => {
                PairedOutput::Interleaved(FastqWriter::create(forward, read_suffix)?)
            }
            (Some(forward), Some(reverse)) => PairedOutput::Split {
                forward: FastqWriter::create(forward, read_suffix)?,
                reverse: FastqWriter::create(reverse, read_suffix)?,
            },
            (None, Some(_)) => {
                return Err(BamfqError::InvalidParameter {
                    parameter: "reverse".to_string(),
                    reason: "An R2 output requires an R1 output".to_string(),
                }
                .into());
            }
        };

        let mut sink = Self::new(paired);
        if let Some(path) = &paths.single {
            sink = sink.with_single(FastqWriter::create(path, read_suffix)?);
        }
        if let Some(path) = &paths.unpaired {
            sink = sink.with_unpaired(FastqWriter::create(path, read_suffix)?);
        }
        Ok(sink)
    }
}

impl PairSink for FastqSink {
    fn write_single(&mut self, record: Record) -> Result<()> {
        match &mut self.single {
            Some(writer) => writer.write(&record),
            None => Ok(()),
        }
    }

    fn write_pair(&mut self, first: Record, second: Record) -> Result<()> {
        match &mut self.paired {
            PairedOutput::Interleaved(writer) => {
                writer.write(&first)?;
                writer.write(&second)
            }
            PairedOutput::Split { forward, reverse } => {
                forward.write(&first)?;
                reverse.write(&second)
            }
        }
    }

    fn write_orphan(&mut self, record: Record) -> Result<()> {
        match &mut self.unpaired {
            Some(writer) => writer.write(&record),
            None => Ok(()),
        }
    }

    fn finish(&mut self) -> Result<()> {
        match &mut self.paired {
            PairedOutput::Interleaved(writer) => writer.finish()?,
            PairedOutput::Split { forward, reverse } => {
                forward.finish()?;
                reverse.finish()?;
            }
        }
        if let Some(writer) = &mut self.single {
            writer.finish()?;
        }
        if let Some(writer) = &mut self.unpaired {
            writer.finish()?;
        }
        Ok(())
    }
}
