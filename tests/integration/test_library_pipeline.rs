//! End-to-end tests of the library pipeline: BAM reader, pairing engine and sinks.

use anyhow::Result;
use bamfq_lib::bam_io::{BamRecords, create_bam_reader, input_header};
use bamfq_lib::errors::BamfqError;
use bamfq_lib::fastq::{FastqPaths, FastqSink};
use bamfq_lib::pairing::{PairingOptions, PairingStats, process};
use bamfq_lib::sink::CollectingSink;
use noodles::sam::alignment::record_buf::RecordBuf;
use rstest::rstest;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tempfile::TempDir;

use crate::helpers::{
    chimeric_pair, create_coordinate_header, fragment, mapped_pair, names, read_fastq,
    sort_by_coordinate, unmapped_pair, write_bam,
};

fn many_templates() -> Vec<RecordBuf> {
    let mut records = Vec::new();
    for i in 0..40 {
        let start = 100 + i * 37;
        let gap = if i % 3 == 0 { 8_000 } else { 150 };
        records.extend(mapped_pair(&format!("pair{i:03}"), 0, start, start + gap, "ACGT", "GGCA"));
    }
    for i in 0..5 {
        records.extend(chimeric_pair(&format!("chim{i}"), 500 + i * 11, 900 + i * 13));
        records.extend(unmapped_pair(&format!("unm{i}"), "AAAA", "CCCC"));
        records.push(fragment(&format!("frag{i}"), 1, 2_000 + i * 5, "TTTT"));
    }
    sort_by_coordinate(&mut records);
    records
}

fn run(path: &Path, options: &PairingOptions) -> Result<(PairingStats, CollectingSink)> {
    let (reader, header) = create_bam_reader(path, options.threads)?;
    let input = input_header(&header);
    let mut sink = CollectingSink::new();
    let stats = process(&input, BamRecords::new(reader, header), &mut sink, options)?;
    Ok((stats, sink))
}

fn pair_names(sink: &CollectingSink) -> Vec<Vec<u8>> {
    let mut names: Vec<Vec<u8>> = sink.pairs.iter().map(|(r1, _)| r1.name().to_vec()).collect();
    names.sort();
    names
}

#[rstest]
#[case::in_memory(5_000, 500_000, 1)]
#[case::everything_spills(0, 500_000, 1)]
#[case::tiny_partitions(0, 3, 1)]
#[case::parallel_partitions(100, 7, 4)]
fn test_pipeline_routes_every_record(
    #[case] distance: u64,
    #[case] max_records_in_ram: usize,
    #[case] threads: usize,
) -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("input.bam");
    write_bam(&path, &create_coordinate_header(), &many_templates());

    let options = PairingOptions::new()
        .distance(distance)
        .max_records_in_ram(max_records_in_ram)
        .temp_dirs(vec![dir.path().join("a"), dir.path().join("b")])
        .threads(threads);
    let (stats, sink) = run(&path, &options)?;

    assert_eq!(stats.records_read, 40 * 2 + 5 * 5);
    assert!(stats.is_conserved());
    assert_eq!(stats.pairs, 50);
    assert_eq!(stats.singles, 5);
    assert_eq!(stats.orphans, 0);
    assert_eq!(sink.pairs.len(), 50);
    assert!(sink.finished);
    for (r1, r2) in &sink.pairs {
        assert_eq!(r1.name(), r2.name());
        assert!(r1.is_first_of_pair() && r2.is_second_of_pair());
    }
    Ok(())
}

#[test]
fn test_pipeline_result_independent_of_distance() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("input.bam");
    write_bam(&path, &create_coordinate_header(), &many_templates());

    let (near, near_sink) = run(&path, &PairingOptions::new())?;
    let (far, far_sink) = run(&path, &PairingOptions::new().distance(0))?;

    assert_eq!(pair_names(&near_sink), pair_names(&far_sink));
    assert!(near.pairs_by_window > 0);
    assert_eq!(far.pairs_by_window, 0);
    assert!(far.spilled() > near.spilled());
    Ok(())
}

#[test]
fn test_pipeline_cancel_before_start() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("input.bam");
    write_bam(&path, &create_coordinate_header(), &many_templates());

    let options = PairingOptions::new().cancel(Arc::new(AtomicBool::new(true)));
    let err = run(&path, &options).err().expect("cancelled run should fail");
    match err.downcast_ref::<BamfqError>() {
        Some(BamfqError::Cancelled { records_read }) => assert_eq!(*records_read, 0),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[test]
fn test_pipeline_into_fastq_sink() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("input.bam");
    write_bam(&path, &create_coordinate_header(), &many_templates());

    let paths = FastqPaths {
        single: Some(dir.path().join("r0.fq")),
        forward: Some(dir.path().join("r1.fq.gz")),
        reverse: Some(dir.path().join("r2.fq.gz")),
        unpaired: Some(dir.path().join("u.fq")),
    };
    let (reader, header) = create_bam_reader(&path, 2)?;
    let input = input_header(&header);
    let stats = process(
        &input,
        BamRecords::new(reader, header),
        FastqSink::from_paths(&paths, true)?,
        &PairingOptions::new(),
    )?;

    let forward = read_fastq(&dir.path().join("r1.fq.gz"));
    let reverse = read_fastq(&dir.path().join("r2.fq.gz"));
    assert_eq!(forward.len() as u64, stats.pairs);
    assert!(names(&forward).iter().all(|n| n.ends_with("/1")));
    assert!(names(&reverse).iter().all(|n| n.ends_with("/2")));
    assert_eq!(read_fastq(&dir.path().join("r0.fq")).len(), 5);
    assert!(read_fastq(&dir.path().join("u.fq")).is_empty());
    Ok(())
}
