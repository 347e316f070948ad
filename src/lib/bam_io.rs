//! BAM input for the pairing engine.
//!
//! Opens a BAM file (or stdin) with single- or multi-threaded BGZF decompression,
//! and decodes noodles records into pairing [`Record`]s.
//!
//! # Threading Model
//!
//! - **Single-threaded**: Use `threads=1` (lower overhead, good for small files)
//! - **Multi-threaded**: Use `threads>1` (higher throughput for large files)

use anyhow::{Context, Result};
use bstr::ByteSlice;
use noodles::bgzf::io::{MultithreadedReader, Reader as BgzfReader};
use noodles::sam::Header;
use noodles::sam::alignment::record_buf::RecordBuf;
use noodles::sam::header::record::value::map::header::tag as header_tag;
use std::fs::File;
use std::io::{self, BufRead, Read};
use std::num::NonZero;
use std::path::Path;

use crate::errors::BamfqError;
use crate::pairing::{InputHeader, SortOrder};
use crate::record::Record;

/// Source of compressed BAM bytes.
type InputStream = Box<dyn Read + Send>;

/// Enum wrapping single-threaded and multi-threaded BGZF readers.
pub enum BgzfReaderEnum {
    /// Single-threaded BGZF reader (lower overhead for small files)
    SingleThreaded(BgzfReader<InputStream>),
    /// Multi-threaded BGZF reader (noodles built-in threading)
    MultiThreaded(MultithreadedReader<InputStream>),
}

impl Read for BgzfReaderEnum {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.read(buf),
            BgzfReaderEnum::MultiThreaded(r) => r.read(buf),
        }
    }
}

impl BufRead for BgzfReaderEnum {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.fill_buf(),
            BgzfReaderEnum::MultiThreaded(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            BgzfReaderEnum::SingleThreaded(r) => r.consume(amt),
            BgzfReaderEnum::MultiThreaded(r) => r.consume(amt),
        }
    }
}

/// A BAM reader over either BGZF reader flavor.
pub type BamReader = noodles::bam::io::Reader<BgzfReaderEnum>;

/// Returns true if `path` names standard input (`-` or `/dev/stdin`).
///
/// ```
/// use bamfq_lib::bam_io::is_stdin_path;
///
/// assert!(is_stdin_path("-"));
/// assert!(is_stdin_path("/dev/stdin"));
/// assert!(!is_stdin_path("input.bam"));
/// ```
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin"
}

/// Open a BAM file, or stdin for `-`, and read its header.
///
/// # Example
/// ```no_run
/// use bamfq_lib::bam_io::create_bam_reader;
///
/// // Multi-threaded with 4 decompression threads
/// let (mut reader, header) = create_bam_reader("input.bam", 4).unwrap();
/// ```
pub fn create_bam_reader<P: AsRef<Path>>(path: P, threads: usize) -> Result<(BamReader, Header)> {
    let path_ref = path.as_ref();
    let stream: InputStream = if is_stdin_path(path_ref) {
        Box::new(io::stdin())
    } else {
        let file = File::open(path_ref)
            .with_context(|| format!("Failed to open input BAM: {}", path_ref.display()))?;
        Box::new(file)
    };

    let bgzf_reader = match NonZero::new(threads).filter(|n| n.get() > 1) {
        Some(worker_count) => {
            BgzfReaderEnum::MultiThreaded(MultithreadedReader::with_worker_count(worker_count, stream))
        }
        None => BgzfReaderEnum::SingleThreaded(BgzfReader::new(stream)),
    };

    let mut reader = noodles::bam::io::Reader::from(bgzf_reader);
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header from: {}", path_ref.display()))?;

    Ok((reader, header))
}

/// The declared sort order of `header`, `unknown` when `@HD SO` is absent.
#[must_use]
pub fn input_header(header: &Header) -> InputHeader {
    let sort_order = match header.header().and_then(|hd| hd.other_fields().get(&header_tag::SORT_ORDER))
    {
        Some(so) => SortOrder::from_header_value(so.as_ref()),
        None => SortOrder::Unknown("unknown".to_string()),
    };
    InputHeader::new(sort_order)
}

/// Decode the pairing fields of `buf`, resolving reference names through `header`.
pub fn record_from_buf(buf: &RecordBuf, header: &Header) -> Result<Record> {
    let name = buf.name().map_or(b"*".as_slice(), |n| n.as_bytes()).to_vec();
    let position = |p: Option<noodles::core::Position>| p.map_or(0, |p| usize::from(p) as i64);

    // BAM encodes absent qualities as 0xFF
    let quals = buf.quality_scores().as_ref();
    let qualities = if quals.iter().all(|&q| q == 0xFF) { Vec::new() } else { quals.to_vec() };

    Ok(Record {
        flags: buf.flags(),
        reference_name: reference_name(header, buf.reference_sequence_id(), &name)?,
        mate_reference_name: reference_name(header, buf.mate_reference_sequence_id(), &name)?,
        alignment_start: position(buf.alignment_start()),
        mate_alignment_start: position(buf.mate_alignment_start()),
        insert_size: buf.template_length(),
        sequence: buf.sequence().as_ref().to_vec(),
        qualities,
        name,
    })
}

fn reference_name(header: &Header, id: Option<usize>, name: &[u8]) -> Result<Option<Vec<u8>>> {
    let Some(id) = id else { return Ok(None) };
    match header.reference_sequences().get_index(id) {
        Some((reference, _)) => Ok(Some(reference.to_vec())),
        None => Err(BamfqError::InvalidFileFormat {
            file_type: "BAM".to_string(),
            path: "input".to_string(),
            reason: format!(
                "Record {} refers to reference sequence {id}, which is not in the header",
                name.as_bstr()
            ),
        }
        .into()),
    }
}

/// Iterator of decoded records from a BAM reader. Ends after the first error.
pub struct BamRecords {
    reader: BamReader,
    header: Header,
    buf: RecordBuf,
    done: bool,
}

impl BamRecords {
    #[must_use]
    pub fn new(reader: BamReader, header: Header) -> Self {
        Self { reader, header, buf: RecordBuf::default(), done: false }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl Iterator for BamRecords {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = match self.reader.read_record_buf(&self.header, &mut self.buf) {
            Ok(0) => {
                self.done = true;
                return None;
            }
            Ok(_) => record_from_buf(&self.buf, &self.header),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read BAM record")),
        };
        self.done = result.is_err();
        Some(result)
    }
}
