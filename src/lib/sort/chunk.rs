//! Temporary partition files for the spill sorter.
//!
//! A partition holds one sorted run of records. The layout is private to a single
//! run and never outlives it:
//!
//! ```text
//! [ordinal: u64][flags: u16][start: i64][mate_start: i64][tlen: i32]
//! [name][reference][mate_reference][sequence][qualities]
//! ```
//!
//! Byte fields are written as a little-endian `u32` length followed by the bytes;
//! an absent optional field is encoded with a length of `u32::MAX`. Partitions may be
//! BGZF-compressed; readers detect compression from the gzip magic bytes.

use crate::record::Record;
use anyhow::{Context, Result, bail};
use noodles::bgzf;
use noodles::bgzf::io::writer::CompressionLevel;
use noodles::sam::alignment::record::Flags;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Buffer size for partition readers and writers.
const CHUNK_BUFFER_SIZE: usize = 256 * 1024;

/// Length marker for an absent optional byte field.
const ABSENT: u32 = u32::MAX;

/// Serialize one keyed record.
pub(crate) fn write_entry<W: Write>(writer: &mut W, ordinal: u64, record: &Record) -> io::Result<()> {
    writer.write_all(&ordinal.to_le_bytes())?;
    writer.write_all(&record.flags.bits().to_le_bytes())?;
    writer.write_all(&record.alignment_start.to_le_bytes())?;
    writer.write_all(&record.mate_alignment_start.to_le_bytes())?;
    writer.write_all(&record.insert_size.to_le_bytes())?;
    write_bytes(writer, Some(&record.name))?;
    write_bytes(writer, record.reference_name.as_deref())?;
    write_bytes(writer, record.mate_reference_name.as_deref())?;
    write_bytes(writer, Some(&record.sequence))?;
    write_bytes(writer, Some(&record.qualities))?;
    Ok(())
}

/// Deserialize one keyed record; the inverse of [`write_entry`].
pub(crate) fn read_entry<R: Read>(reader: &mut R) -> io::Result<(u64, Record)> {
    let ordinal = u64::from_le_bytes(read_array(reader)?);
    let flags = Flags::from(u16::from_le_bytes(read_array(reader)?));
    let alignment_start = i64::from_le_bytes(read_array(reader)?);
    let mate_alignment_start = i64::from_le_bytes(read_array(reader)?);
    let insert_size = i32::from_le_bytes(read_array(reader)?);
    let name = read_bytes(reader)?.unwrap_or_default();
    let reference_name = read_bytes(reader)?;
    let mate_reference_name = read_bytes(reader)?;
    let sequence = read_bytes(reader)?.unwrap_or_default();
    let qualities = read_bytes(reader)?.unwrap_or_default();

    let record = Record {
        name,
        flags,
        reference_name,
        mate_reference_name,
        alignment_start,
        mate_alignment_start,
        insert_size,
        sequence,
        qualities,
    };
    Ok((ordinal, record))
}

#[allow(clippy::cast_possible_truncation)]
fn write_bytes<W: Write>(writer: &mut W, bytes: Option<&[u8]>) -> io::Result<()> {
    match bytes {
        Some(b) => {
            if b.len() >= ABSENT as usize {
                return Err(io::Error::new(io::ErrorKind::InvalidInput, "field too long for spill"));
            }
            writer.write_all(&(b.len() as u32).to_le_bytes())?;
            writer.write_all(b)
        }
        None => writer.write_all(&ABSENT.to_le_bytes()),
    }
}

fn read_bytes<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let len = u32::from_le_bytes(read_array(reader)?);
    if len == ABSENT {
        return Ok(None);
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(Some(buf))
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Wrapper for partition writers supporting both raw and compressed output.
enum ChunkWriterInner {
    /// Uncompressed raw output (fastest).
    Raw(BufWriter<File>),
    /// BGZF-compressed output.
    Bgzf(bgzf::io::Writer<BufWriter<File>>),
}

impl Write for ChunkWriterInner {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ChunkWriterInner::Raw(w) => w.write(buf),
            ChunkWriterInner::Bgzf(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ChunkWriterInner::Raw(w) => w.flush(),
            ChunkWriterInner::Bgzf(w) => w.flush(),
        }
    }
}

/// Writes one sorted partition to disk.
pub(crate) struct ChunkWriter {
    writer: ChunkWriterInner,
    path: PathBuf,
    records: u64,
}

impl ChunkWriter {
    /// Create a partition file.
    ///
    /// `compression_level` 0 writes raw bytes; anything higher uses BGZF at that level.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn create(path: &Path, compression_level: u32) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create spill partition: {}", path.display()))?;
        let buf = BufWriter::with_capacity(CHUNK_BUFFER_SIZE, file);

        let writer = if compression_level == 0 {
            ChunkWriterInner::Raw(buf)
        } else {
            let mut builder = bgzf::io::writer::Builder::default();
            if let Some(level) = CompressionLevel::new(compression_level.min(9) as u8) {
                builder = builder.set_compression_level(level);
            }
            ChunkWriterInner::Bgzf(builder.build_from_writer(buf))
        };

        Ok(Self { writer, path: path.to_path_buf(), records: 0 })
    }

    #[inline]
    pub(crate) fn write_entry(&mut self, ordinal: u64, record: &Record) -> Result<()> {
        write_entry(&mut self.writer, ordinal, record)
            .with_context(|| format!("Failed to write spill partition: {}", self.path.display()))?;
        self.records += 1;
        Ok(())
    }

    /// Flush and close the partition, returning a handle that can reopen it.
    pub(crate) fn finish(self) -> Result<Chunk> {
        let path = self.path;
        match self.writer {
            ChunkWriterInner::Raw(mut w) => w.flush(),
            ChunkWriterInner::Bgzf(w) => w.finish().map(|_| ()),
        }
        .with_context(|| format!("Failed to finish spill partition: {}", path.display()))?;
        Ok(Chunk { path, records: self.records })
    }
}

/// A partition on disk together with the number of records it holds.
#[derive(Debug, Clone)]
pub(crate) struct Chunk {
    pub(crate) path: PathBuf,
    pub(crate) records: u64,
}

enum ChunkReaderInner {
    Raw(BufReader<File>),
    Bgzf(bgzf::io::Reader<BufReader<File>>),
}

impl Read for ChunkReaderInner {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ChunkReaderInner::Raw(r) => r.read(buf),
            ChunkReaderInner::Bgzf(r) => r.read(buf),
        }
    }
}

/// Sequential reader over one partition.
///
/// The reader knows how many records the partition was written with, so a truncated
/// file is reported as an error rather than silently ending the run early.
pub(crate) struct ChunkReader {
    reader: ChunkReaderInner,
    path: PathBuf,
    remaining: u64,
}

impl ChunkReader {
    pub(crate) fn open(chunk: &Chunk) -> Result<Self> {
        let path = &chunk.path;
        let file = File::open(path)
            .with_context(|| format!("Failed to open spill partition: {}", path.display()))?;
        let mut buf_reader = BufReader::with_capacity(CHUNK_BUFFER_SIZE, file);

        // Check for gzip/BGZF magic bytes: 0x1f 0x8b
        let mut magic = [0u8; 2];
        let is_compressed = buf_reader.read_exact(&mut magic).is_ok() && magic == [0x1f, 0x8b];
        buf_reader
            .seek(SeekFrom::Start(0))
            .with_context(|| format!("Failed to seek in spill partition: {}", path.display()))?;

        let reader = if is_compressed {
            ChunkReaderInner::Bgzf(bgzf::io::Reader::new(buf_reader))
        } else {
            ChunkReaderInner::Raw(buf_reader)
        };

        Ok(Self { reader, path: path.clone(), remaining: chunk.records })
    }

    /// Read the next keyed record, or `None` once every record has been read.
    pub(crate) fn next_entry(&mut self) -> Result<Option<(u64, Record)>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        let entry = read_entry(&mut self.reader).with_context(|| {
            format!(
                "Failed to read spill partition {} ({} records missing)",
                self.path.display(),
                self.remaining
            )
        })?;
        self.remaining -= 1;
        Ok(Some(entry))
    }

    /// Fail if the partition still holds bytes past its last record.
    pub(crate) fn ensure_exhausted(&mut self) -> Result<()> {
        let mut extra = [0u8; 1];
        match self.reader.read(&mut extra) {
            Ok(0) => Ok(()),
            Ok(_) => bail!("Spill partition {} has trailing data", self.path.display()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to read spill partition: {}", self.path.display())
            }),
        }
    }
}
