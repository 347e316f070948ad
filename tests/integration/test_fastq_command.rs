//! Integration tests for the fastq command.

use noodles::sam::alignment::record::Flags;
use noodles::sam::alignment::record_buf::RecordBuf;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

use crate::helpers::{
    AlignmentBuilder, FastqEntry, assert_mates_aligned, chimeric_pair, create_coordinate_header,
    create_header, fragment, mapped_pair, names, parse_fastq, read_fastq, sort_by_coordinate,
    unmapped_pair, write_bam,
};

fn run_fastq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bamfq"))
        .arg("fastq")
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run fastq command")
}

fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "fastq command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn write_sorted_bam(path: &Path, mut records: Vec<RecordBuf>) {
    sort_by_coordinate(&mut records);
    write_bam(path, &create_coordinate_header(), &records);
}

/// A close pair, a far pair, a chimeric pair, an unmapped pair and a fragment.
fn mixed_records() -> Vec<RecordBuf> {
    let mut records = mapped_pair("close1", 0, 100, 200, "ACGTACGT", "AAAACCCC");
    records.extend(mapped_pair("far1", 0, 1000, 50_000, "CCCCCCCC", "GGGGAAAA"));
    records.extend(chimeric_pair("chim1", 300, 400));
    records.extend(unmapped_pair("unm1", "ACACACAC", "GTGTGTGT"));
    records.push(fragment("frag1", 0, 150, "TTTTTTTT"));
    records
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn test_fastq_split_outputs() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let (r0, r1, r2) =
        (dir.path().join("r0.fq"), dir.path().join("r1.fq"), dir.path().join("r2.fq"));
    write_sorted_bam(&input, mixed_records());

    let output = run_fastq(&[
        "-i",
        path_str(&input),
        "--R0",
        path_str(&r0),
        "--R1",
        path_str(&r1),
        "--R2",
        path_str(&r2),
    ]);
    assert_success(&output);

    let (singles, forward, reverse) = (read_fastq(&r0), read_fastq(&r1), read_fastq(&r2));
    assert_eq!(names(&singles), vec!["frag1"]);
    assert_mates_aligned(&forward, &reverse);
    // The close pair is matched while streaming; the rest come out of the name sort.
    assert_eq!(names(&forward), vec!["close1", "chim1", "far1", "unm1"]);

    assert_eq!(forward[0].sequence, "ACGTACGT");
    assert_eq!(reverse[0].sequence, "GGGGTTTT");
    assert_eq!(reverse[1].sequence, "TTTTCCCC");
    assert_eq!(reverse[2].sequence, "TTTTCCCC");
}

#[test]
fn test_fastq_interleaved_stdout_with_suffix() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let mut records = mapped_pair("q1", 0, 100, 300, "ACGT", "ACGG");
    records.extend(mapped_pair("q2", 0, 200, 400, "TTTT", "CCCC"));
    write_sorted_bam(&input, records);

    let output = run_fastq(&["-i", path_str(&input), "--read-suffix"]);
    assert_success(&output);

    let entries = parse_fastq(output.stdout.as_slice());
    assert_eq!(names(&entries), vec!["q1/1", "q1/2", "q2/1", "q2/2"]);
    assert_eq!(entries[1].sequence, "CCGT");
    assert_eq!(entries[3].sequence, "GGGG");
}

#[test]
fn test_fastq_interleaved_file_without_suffix() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let interleaved = dir.path().join("interleaved.fastq");
    write_sorted_bam(&input, mapped_pair("q1", 0, 100, 300, "ACGT", "ACGT"));

    assert_success(&run_fastq(&["-i", path_str(&input), "--forward", path_str(&interleaved)]));

    assert_eq!(names(&read_fastq(&interleaved)), vec!["q1", "q1"]);
}

#[test]
fn test_fastq_gzip_outputs() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let (r1, r2) = (dir.path().join("r1.fq.gz"), dir.path().join("r2.fastq.gz"));
    write_sorted_bam(&input, mixed_records());

    assert_success(&run_fastq(&[
        "-i",
        path_str(&input),
        "--R1",
        path_str(&r1),
        "--R2",
        path_str(&r2),
    ]));

    let gz_magic = [0x1f, 0x8b];
    assert_eq!(&fs::read(&r1).unwrap()[..2], &gz_magic);
    let (forward, reverse) = (read_fastq(&r1), read_fastq(&r2));
    assert_eq!(forward.len(), 4);
    assert_mates_aligned(&forward, &reverse);
}

#[test]
fn test_fastq_reverse_strand_qualities() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let mut records = mapped_pair("q1", 0, 100, 200, "ACGT", "AACG");
    records[1] = AlignmentBuilder::new("q1", "AACG")
        .flags(Flags::SEGMENTED | Flags::LAST_SEGMENT | Flags::REVERSE_COMPLEMENTED)
        .qualities(&[10, 20, 30, 40])
        .mapped(0, 200)
        .mate(0, 100)
        .template_length(-104)
        .build();
    write_sorted_bam(&input, records);

    let output = run_fastq(&["-i", path_str(&input)]);
    assert_success(&output);

    let entries = parse_fastq(output.stdout.as_slice());
    assert_eq!(entries[1], FastqEntry {
        name: "q1".to_string(),
        sequence: "CGTT".to_string(),
        quality: "I?5+".to_string(),
    });
}

#[test]
fn test_fastq_orphans_to_unpaired() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let (r1, unpaired) = (dir.path().join("r1.fq"), dir.path().join("orphans.fq"));
    let mut records = mapped_pair("q1", 0, 100, 200, "ACGT", "ACGT");
    // Mate points far downstream but never appears.
    records.push(
        AlignmentBuilder::new("lonely", "GATTACA")
            .flags(Flags::SEGMENTED | Flags::FIRST_SEGMENT)
            .mapped(0, 500)
            .mate(0, 90_000)
            .template_length(89_507)
            .build(),
    );
    write_sorted_bam(&input, records);

    assert_success(&run_fastq(&[
        "-i",
        path_str(&input),
        "--R1",
        path_str(&r1),
        "-U",
        path_str(&unpaired),
    ]));

    assert_eq!(names(&read_fastq(&r1)), vec!["q1", "q1"]);
    let orphans = read_fastq(&unpaired);
    assert_eq!(names(&orphans), vec!["lonely"]);
    assert_eq!(orphans[0].sequence, "GATTACA");
}

#[test]
fn test_fastq_orphans_discarded_without_unpaired_output() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let r1 = dir.path().join("r1.fq");
    write_sorted_bam(&input, vec![
        AlignmentBuilder::new("lonely", "ACGT")
            .flags(Flags::SEGMENTED | Flags::LAST_SEGMENT)
            .mapped(0, 500)
            .mate(1, 100)
            .build(),
    ]);

    assert_success(&run_fastq(&["-i", path_str(&input), "--R1", path_str(&r1)]));
    assert!(read_fastq(&r1).is_empty());
}

#[test]
fn test_fastq_secondary_and_supplementary_skipped() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let mut records = mapped_pair("q1", 0, 100, 200, "ACGT", "ACGT");
    for (flag, start) in [(Flags::SECONDARY, 120), (Flags::SUPPLEMENTARY, 150)] {
        records.push(
            AlignmentBuilder::new("q1", "ACGT")
                .flags(Flags::SEGMENTED | Flags::FIRST_SEGMENT | flag)
                .mapped(0, start)
                .mate(0, 200)
                .build(),
        );
    }
    write_sorted_bam(&input, records);

    let output = run_fastq(&["-i", path_str(&input)]);
    assert_success(&output);
    assert_eq!(parse_fastq(output.stdout.as_slice()).len(), 2);
}

#[test]
fn test_fastq_small_distance_spills_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let spill_dir = dir.path().join("spill");
    let (r1, r2) = (dir.path().join("r1.fq"), dir.path().join("r2.fq"));

    let mut records = Vec::new();
    for i in 0..25 {
        let start = 100 + i * 50;
        records.extend(mapped_pair(&format!("t{i:02}"), 0, start, start + 2_000, "ACGT", "TTGA"));
    }
    write_sorted_bam(&input, records);

    let output = run_fastq(&[
        "-i",
        path_str(&input),
        "--R1",
        path_str(&r1),
        "--R2",
        path_str(&r2),
        "-d",
        "1kb",
        "--max-records-in-ram",
        "4",
        "-T",
        path_str(&spill_dir),
        "--temp-compression",
        "0",
        "-@",
        "2",
    ]);
    assert_success(&output);

    let (forward, reverse) = (read_fastq(&r1), read_fastq(&r2));
    assert_eq!(forward.len(), 25);
    assert_mates_aligned(&forward, &reverse);
    assert!(reverse.iter().all(|e| e.sequence == "TCAA"));

    assert!(String::from_utf8_lossy(&output.stderr).contains("Spilled"));
    let leftover: Vec<_> = fs::read_dir(&spill_dir).unwrap().collect();
    assert!(leftover.is_empty(), "spill partitions left behind: {leftover:?}");
}

#[test]
fn test_fastq_default_distance_pairs_in_memory() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let mut records = Vec::new();
    for i in 0..10 {
        let start = 100 + i * 10;
        records.extend(mapped_pair(&format!("t{i}"), 0, start, start + 2_000, "ACGT", "ACGT"));
    }
    write_sorted_bam(&input, records);

    let output = run_fastq(&["-i", path_str(&input)]);
    assert_success(&output);
    assert_eq!(parse_fastq(output.stdout.as_slice()).len(), 20);
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Spilled"));
}

#[test]
fn test_fastq_reads_stdin() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    write_sorted_bam(&input, mixed_records());
    let bytes = fs::read(&input).unwrap();

    let mut child = Command::new(env!("CARGO_BIN_EXE_bamfq"))
        .args(["fastq", "-i", "-", "--read-suffix"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn fastq command");
    child.stdin.take().unwrap().write_all(&bytes).unwrap();
    let output = child.wait_with_output().unwrap();
    assert_success(&output);

    let entries = parse_fastq(output.stdout.as_slice());
    assert_eq!(entries.len(), 8);
    assert_eq!(entries[0].name, "close1/1");
}

#[test]
fn test_fastq_rejects_queryname_sorted_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    let r1 = dir.path().join("r1.fq");
    write_bam(&input, &create_header("queryname"), &mapped_pair("q1", 0, 100, 200, "AC", "GT"));

    let output = run_fastq(&["-i", path_str(&input), "--R1", path_str(&r1)]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not sorted on coordinate"), "unexpected stderr: {stderr}");
    assert!(!r1.exists(), "outputs should not be created for rejected input");
}

#[test]
fn test_fastq_reverse_without_forward_fails() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    write_sorted_bam(&input, mapped_pair("q1", 0, 100, 200, "AC", "GT"));
    let r2 = dir.path().join("r2.fq");

    let output = run_fastq(&["-i", path_str(&input), "--R2", path_str(&r2)]);
    assert!(!output.status.success());
}

#[test]
fn test_fastq_missing_input_fails() {
    let output = run_fastq(&["-i", "/nonexistent/input.bam"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_fastq_rejects_unknown_output_extension() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.bam");
    write_sorted_bam(&input, mapped_pair("q1", 0, 100, 200, "AC", "GT"));
    let out = dir.path().join("r1.txt");

    let output = run_fastq(&["-i", path_str(&input), "--R1", path_str(&out)]);
    assert!(!output.status.success());
}
