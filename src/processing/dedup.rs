//! Exact-line deduplication.
//!
//! Two phases over the same shard list. Phase A streams every line of
//! every record through a shared table of saturating 8-bit counters,
//! indexed by 64-bit line fingerprint. Phase B re-reads the shards
//! and keeps only lines whose count is exactly one; records left with
//! nothing but whitespace are dropped.
//!
//! The table is owned by the orchestrator and shared read-write with
//! all workers. Increments are relaxed atomics: Phase B only ever
//! asks `== 1` vs `!= 1`, and the pool join between phases is the
//! happens-before barrier that makes Phase-A writes visible.
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use glob::glob;
use log::{error, info, warn};
use rayon::prelude::*;
use twox_hash::XxHash64;

use crate::error::Error;
use crate::io::reader::Shard;
use crate::io::writer::conversion_sink;
use crate::io::TextRecord;
use crate::pipelines::counter::{FilterCounter, TOTAL_TAG};

/// Fingerprint seed. Fixed so both phases agree on slots.
const FINGERPRINT_SEED: u64 = 0;

const FILTERED_TAG: &str = "02_filtered";
const PASSED_TAG: &str = "03_passed";

/// Shared table of saturating line counters.
///
/// Sized at construction; a good size is at least twice the expected
/// number of distinct lines, keeping the load factor under 0.5 and
/// the per-line collision probability around `lines / size`.
pub struct LineCounts {
    slots: Vec<AtomicU8>,
    cap: u8,
}

impl LineCounts {
    /// Allocate a zeroed table. Failure to reserve the table is a
    /// [Error::ResourceExhausted].
    pub fn new(size: usize, cap: u8) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::Usage("count table size must be positive".to_string()));
        }
        if cap < 2 {
            return Err(Error::Usage(
                "count table cap must be at least 2".to_string(),
            ));
        }

        let mut slots = Vec::new();
        slots.try_reserve_exact(size)?;
        slots.resize_with(size, || AtomicU8::new(0));

        Ok(Self { slots, cap })
    }

    fn slot(&self, line: &str) -> &AtomicU8 {
        let mut hasher = XxHash64::with_seed(FINGERPRINT_SEED);
        hasher.write(line.as_bytes());
        let index = (hasher.finish() % (self.slots.len() as u64)) as usize;
        &self.slots[index]
    }

    /// Saturating increment. Concurrent callers may retry but never
    /// lose an increment below the cap, so a line seen twice always
    /// ends with a count of at least two.
    pub fn add(&self, line: &str) {
        let slot = self.slot(line);
        let mut seen = slot.load(Ordering::Relaxed);
        while seen < self.cap {
            match slot.compare_exchange_weak(seen, seen + 1, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => seen = current,
            }
        }
    }

    /// True iff the line was seen exactly once during the count phase.
    pub fn is_unique(&self, line: &str) -> bool {
        self.slot(line).load(Ordering::Relaxed) == 1
    }

    #[cfg(test)]
    fn count(&self, line: &str) -> u8 {
        self.slot(line).load(Ordering::Relaxed)
    }
}

/// Outcome of a dedup run.
#[derive(Debug)]
pub struct DedupReport {
    pub counters: FilterCounter,
    pub failed_shards: usize,
}

/// Two-phase exact-line dedup over every shard in `src`.
pub fn dedup(
    src: &Path,
    dst: &Path,
    table_size: usize,
    cap: u8,
    workers: Option<usize>,
) -> Result<DedupReport, Error> {
    let shards = shard_paths(src)?;
    if shards.is_empty() {
        return Err(Error::Usage(format!("no shards found in {:?}", src)));
    }
    if !dst.exists() {
        warn!("Destination directory does not exist. Creating");
        std::fs::create_dir_all(dst)?;
    }

    let counts = LineCounts::new(table_size, cap)?;

    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let n_workers = workers.unwrap_or(cpus).min(cpus).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .build()
        .map_err(|e| Error::Custom(format!("could not build worker pool: {}", e)))?;

    info!(
        "phase A: counting lines over {} shards ({} slots, cap {})",
        shards.len(),
        table_size,
        cap
    );
    let phase_a: Vec<(PathBuf, Result<(), Error>)> = pool.install(|| {
        shards
            .par_iter()
            .map(|path| (path.clone(), count_shard(path, &counts)))
            .collect()
    });
    // the pool has drained here: every phase-A write is visible below

    let mut failed = Vec::new();
    for (path, result) in &phase_a {
        if let Err(e) = result {
            error!("Error counting shard {:?}: {:?}", path, e);
            failed.push(path.clone());
        }
    }

    info!("phase B: emitting shards with repeated lines removed");
    let results: Vec<(PathBuf, Result<FilterCounter, Error>)> = pool.install(|| {
        shards
            .par_iter()
            // a shard that failed the count phase yields no output
            .filter(|path| !failed.contains(*path))
            .map(|path| {
                let result = match path.file_name() {
                    Some(name) => emit_shard(path, &dst.join(name), &counts),
                    None => Err(Error::Custom(format!("no file name in {:?}", path))),
                };
                (path.clone(), result)
            })
            .collect()
    });

    let mut counters = FilterCounter::new();
    let mut failed_shards = failed.len();
    for (path, result) in results {
        match result {
            Ok(counter) => counters.merge(counter),
            Err(e) => {
                failed_shards += 1;
                error!("Error emitting shard {:?}: {:?}", path, e);
            }
        }
    }

    info!("dedup counts:\n{}", counters);
    Ok(DedupReport {
        counters,
        failed_shards,
    })
}

fn shard_paths(src: &Path) -> Result<Vec<PathBuf>, Error> {
    let pattern = src.join("*.gz");
    let pattern = pattern
        .to_str()
        .ok_or_else(|| Error::Usage(format!("invalid source path {:?}", src)))?;

    let mut paths: Vec<PathBuf> = glob(pattern)
        .map_err(|e| Error::Usage(format!("invalid source pattern: {}", e)))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                error!("error reading shard directory: {}", e);
                None
            }
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Phase A worker: count every line of every record.
fn count_shard(path: &Path, counts: &LineCounts) -> Result<(), Error> {
    for record in Shard::from_path_gzip(path)?.text_records() {
        let record = record?;
        for line in record.content.split('\n') {
            counts.add(line);
        }
    }
    Ok(())
}

/// Phase B worker: keep lines seen exactly once, drop records that
/// end up whitespace-only.
fn emit_shard(input: &Path, output: &Path, counts: &LineCounts) -> Result<FilterCounter, Error> {
    let mut counter = FilterCounter::new();
    let mut sink = conversion_sink(output)?;

    for record in Shard::from_path_gzip(input)?.text_records() {
        let record = record?;
        counter.add(TOTAL_TAG);

        let kept: Vec<&str> = record
            .content
            .split('\n')
            .filter(|line| counts.is_unique(line))
            .collect();
        let body = kept.join("\n");

        if body.trim().is_empty() {
            counter.add(FILTERED_TAG);
            continue;
        }

        counter.add(PASSED_TAG);
        sink.write(&TextRecord::new(record.url, record.id, body))?;
    }

    Ok(counter)
}
