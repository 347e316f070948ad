//! FASTQ readers and assertions for command output.

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// One FASTQ entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastqEntry {
    pub name: String,
    pub sequence: String,
    pub quality: String,
}

/// Parses FASTQ entries from any reader.
pub fn parse_fastq<R: Read>(reader: R) -> Vec<FastqEntry> {
    let lines: Vec<String> =
        BufReader::new(reader).lines().map(|l| l.expect("Failed to read line")).collect();
    assert_eq!(lines.len() % 4, 0, "FASTQ has a truncated entry");

    lines
        .chunks(4)
        .map(|chunk| {
            assert!(chunk[0].starts_with('@'), "bad header line: {}", chunk[0]);
            assert_eq!(chunk[2], "+");
            assert_eq!(chunk[1].len(), chunk[3].len(), "sequence and quality lengths differ");
            FastqEntry {
                name: chunk[0][1..].to_string(),
                sequence: chunk[1].clone(),
                quality: chunk[3].clone(),
            }
        })
        .collect()
}

/// Reads a FASTQ file, plain or gzip-compressed by extension.
pub fn read_fastq(path: &Path) -> Vec<FastqEntry> {
    let file = File::open(path).expect("Failed to open FASTQ");
    if path.extension().is_some_and(|ext| ext == "gz") {
        parse_fastq(MultiGzDecoder::new(file))
    } else {
        parse_fastq(file)
    }
}

/// Names of the entries, in order.
pub fn names(entries: &[FastqEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

/// Asserts that R1 and R2 outputs line up entry by entry.
pub fn assert_mates_aligned(r1: &[FastqEntry], r2: &[FastqEntry]) {
    assert_eq!(r1.len(), r2.len(), "R1 and R2 have different entry counts");
    for (a, b) in r1.iter().zip(r2) {
        assert_eq!(a.name, b.name, "R1 and R2 out of step");
    }
}
