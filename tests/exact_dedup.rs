use std::path::Path;

use shelob::io::writer::conversion_sink;
use shelob::io::{Shard, TextRecord};
use shelob::processing::dedup::dedup;

fn record(name: &str, content: &str) -> TextRecord {
    TextRecord::new(
        format!("http://example.com/{}", name),
        format!("<urn:uuid:{}>", name),
        content.to_string(),
    )
}

fn write_shard(path: &Path, records: &[TextRecord]) {
    let mut sink = conversion_sink(path).unwrap();
    for record in records {
        sink.write(record).unwrap();
    }
}

fn read_contents(path: &Path) -> Vec<String> {
    Shard::from_path_gzip(path)
        .unwrap()
        .text_records()
        .map(|record| record.unwrap().content)
        .collect()
}

#[test_log::test]
fn removes_lines_repeated_across_shards() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    // lines B and C appear in more than one record; everything else
    // is unique
    write_shard(
        &src.path().join("x.warc.gz"),
        &[record("x1", "A\nB\nC"), record("x2", "D\nE")],
    );
    write_shard(
        &src.path().join("y.warc.gz"),
        &[record("y1", "B\nF"), record("y2", "C\nG")],
    );

    let report = dedup(src.path(), dst.path(), 1 << 16, 10, Some(2)).unwrap();
    assert_eq!(report.failed_shards, 0);
    assert_eq!(report.counters.get("01_total"), 4);
    assert_eq!(report.counters.get("03_passed"), 4);

    assert_eq!(
        read_contents(&dst.path().join("x.warc.gz")),
        vec!["A".to_string(), "D\nE".to_string()]
    );
    assert_eq!(
        read_contents(&dst.path().join("y.warc.gz")),
        vec!["F".to_string(), "G".to_string()]
    );
}

#[test]
fn drops_records_left_empty() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    // both records are made of repeated lines only and must vanish;
    // the third keeps its unique line
    write_shard(
        &src.path().join("0.warc.gz"),
        &[
            record("a", "same line\nother line"),
            record("b", "same line\nother line"),
            record("c", "same line\nunique line"),
        ],
    );

    let report = dedup(src.path(), dst.path(), 1 << 16, 10, None).unwrap();
    assert_eq!(report.counters.get("01_total"), 3);
    assert_eq!(report.counters.get("02_filtered"), 2);
    assert_eq!(report.counters.get("03_passed"), 1);

    assert_eq!(
        read_contents(&dst.path().join("0.warc.gz")),
        vec!["unique line".to_string()]
    );
}

#[test]
fn unique_records_pass_untouched() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    write_shard(
        &src.path().join("0.warc.gz"),
        &[record("a", "alpha\nbeta"), record("b", "gamma\ndelta")],
    );

    let report = dedup(src.path(), dst.path(), 1 << 16, 10, None).unwrap();
    assert_eq!(report.counters.get("03_passed"), 2);

    assert_eq!(
        read_contents(&dst.path().join("0.warc.gz")),
        vec!["alpha\nbeta".to_string(), "gamma\ndelta".to_string()]
    );
}

#[test_log::test]
fn saturated_counters_still_filter() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    // "noise" appears far beyond the cap; saturation must not bring
    // its count back to one
    let mut records = Vec::new();
    for i in 0..50 {
        records.push(record(&format!("r{}", i), &format!("noise\nkeep {}", i)));
    }
    write_shard(&src.path().join("0.warc.gz"), &records);

    let report = dedup(src.path(), dst.path(), 1 << 16, 3, None).unwrap();
    assert_eq!(report.counters.get("03_passed"), 50);

    let contents = read_contents(&dst.path().join("0.warc.gz"));
    assert_eq!(contents.len(), 50);
    for (i, content) in contents.iter().enumerate() {
        assert_eq!(content, &format!("keep {}", i));
    }
}
