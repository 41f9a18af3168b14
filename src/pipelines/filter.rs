//! Shard filtering pipeline.
//!
//! One worker per shard: records stream through the predicate chain,
//! survivors are rewritten to the destination under the same file
//! name, and each worker hands back its disposition counters. The
//! orchestrator fans workers out on a bounded pool, merges counters
//! and keeps going when a shard fails.
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use glob::glob;
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::error::Error;
use crate::identifiers::{with_registry, ModelPaths};
use crate::io::reader::Shard;
use crate::io::writer::conversion_sink;
use crate::pipelines::chain::Chain;
use crate::pipelines::counter::{FilterCounter, TOTAL_TAG};
use crate::pipelines::pipeline::Pipeline;

/// Shuffle seed for shard ordering, fixed for reproducible batches.
const SHUFFLE_SEED: u64 = 42;

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct FilterReport {
    pub counters: FilterCounter,
    pub failed_shards: usize,
}

pub struct FilterPipeline {
    src: PathBuf,
    dst: PathBuf,
    chain: Chain,
    paths: ModelPaths,
    workers: Option<usize>,
    max_shards: Option<usize>,
}

impl FilterPipeline {
    pub fn new(
        src: PathBuf,
        dst: PathBuf,
        chain: Chain,
        paths: ModelPaths,
        workers: Option<usize>,
        max_shards: Option<usize>,
    ) -> Self {
        Self {
            src,
            dst,
            chain,
            paths,
            workers,
            max_shards,
        }
    }

    /// Gzipped shards under the source directory, shuffled with a
    /// fixed seed and truncated to the configured cap.
    fn shard_paths(&self) -> Result<Vec<PathBuf>, Error> {
        let pattern = self.src.join("*.gz");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| Error::Usage(format!("invalid source path {:?}", self.src)))?;

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

        let mut rng = StdRng::seed_from_u64(SHUFFLE_SEED);
        paths.shuffle(&mut rng);

        if let Some(cap) = self.max_shards {
            paths.truncate(cap);
        }
        Ok(paths)
    }

    /// Process a single shard.
    ///
    /// Records are read in order, accounted under exactly one tag
    /// (their first failing predicate, or `passed`) and written out in
    /// input order, so reruns produce byte-identical shards.
    pub fn process_shard(
        input: &Path,
        output: &Path,
        chain: &Chain,
        paths: &ModelPaths,
    ) -> Result<FilterCounter, Error> {
        info!("working on shard: {:?}", input);

        let shard = Shard::from_path_gzip(input)?;
        let mut sink = conversion_sink(output)?;
        let mut counter = FilterCounter::new();

        with_registry(paths, |registry| -> Result<(), Error> {
            for record in shard.text_records() {
                let mut record = record?;
                counter.add(TOTAL_TAG);

                match chain.apply(registry, &mut record.content)? {
                    Some(tag) => counter.add(&tag),
                    None => {
                        counter.add(&chain.passed_tag());
                        sink.write(&record)?;
                    }
                }
            }
            Ok(())
        })?;

        Ok(counter)
    }

    /// Pool sizing: `min(cpus, ceil(shards / 2))`, at least one.
    fn worker_count(&self, n_shards: usize) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let cpus = self.workers.unwrap_or(cpus).min(cpus).max(1);
        cpus.min((n_shards + 1) / 2).max(1)
    }
}

impl Pipeline<FilterReport> for FilterPipeline {
    fn run(&self) -> Result<FilterReport, Error> {
        let shards = self.shard_paths()?;
        if shards.is_empty() {
            return Err(Error::Usage(format!("no shards found in {:?}", self.src)));
        }

        if !self.dst.exists() {
            warn!("Destination directory does not exist. Creating");
            std::fs::create_dir_all(&self.dst)?;
        }

        let workers = self.worker_count(shards.len());
        info!("processing {} shards with {} workers", shards.len(), workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::Custom(format!("could not build worker pool: {}", e)))?;

        let results: Vec<(PathBuf, Result<FilterCounter, Error>)> = pool.install(|| {
            shards
                .par_iter()
                .map(|input| {
                    let result = match input.file_name() {
                        Some(name) => {
                            Self::process_shard(input, &self.dst.join(name), &self.chain, &self.paths)
                        }
                        None => Err(Error::Custom(format!("no file name in {:?}", input))),
                    };
                    if result.is_ok() {
                        info!("shard {:?} done", input);
                    }
                    (input.clone(), result)
                })
                .collect()
        });

        let mut counters = FilterCounter::new();
        let mut failed_shards = 0;
        for (path, result) in results {
            match result {
                Ok(counter) => counters.merge(counter),
                Err(e) => {
                    failed_shards += 1;
                    error!("Error with shard {:?}: {:?}", path, e);
                }
            }
        }

        info!("filter counts:\n{}", counters);
        if failed_shards > 0 {
            warn!("{} shard(s) yielded no output", failed_shards);
        }

        let report_path = self.dst.join("counters.json");
        let mut report_file = File::create(&report_path)?;
        report_file.write_all(
            serde_json::to_string_pretty(&counters)
                .map_err(|e| Error::Custom(format!("could not serialize counters: {}", e)))?
                .as_bytes(),
        )?;

        Ok(FilterReport {
            counters,
            failed_shards,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::FilterPipeline;
    use crate::filtering::gopher::GopherQuality;
    use crate::identifiers::ModelPaths;
    use crate::io::writer::conversion_sink;
    use crate::io::TextRecord;
    use crate::pipelines::chain::{Chain, Step};
    use crate::pipelines::counter::TOTAL_TAG;

    fn write_shard(path: &std::path::Path, records: &[TextRecord]) {
        let mut sink = conversion_sink(path).unwrap();
        for record in records {
            sink.write(record).unwrap();
        }
    }

    fn record(url: &str, content: &str) -> TextRecord {
        TextRecord::new(url.to_string(), format!("<urn:uuid:{}>", url), content.to_string())
    }

    #[test]
    fn test_every_record_accounted_once() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("0.warc.gz");
        let output = dir.path().join("out.warc.gz");

        let long = "common ordinary words keep flowing through this plain sentence today "
            .repeat(10);
        write_shard(
            &input,
            &[
                record("a", &long),
                record("b", "too short"),
                record("c", &long),
                record("d", "also short"),
            ],
        );

        // model-free chain so the test runs without fasttext files
        let chain = Chain::new(vec![
            Step::Quality(GopherQuality::with_min_words(50)),
            Step::MaskPii,
        ]);
        let counter =
            FilterPipeline::process_shard(&input, &output, &chain, &ModelPaths::default())
                .unwrap();

        let total = counter.get(TOTAL_TAG);
        let accounted: u64 = counter
            .iter()
            .filter(|(tag, _)| *tag != TOTAL_TAG)
            .map(|(_, count)| count)
            .sum();
        assert_eq!(total, 4);
        assert_eq!(accounted, total);
        assert_eq!(counter.get("04_passed"), 2);
        assert_eq!(counter.get("02_quality_too_short"), 2);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("0.warc.gz");

        let long = "common ordinary words keep flowing through this plain sentence today "
            .repeat(10);
        write_shard(&input, &[record("a", &long), record("b", "nope")]);

        let chain = || Chain::new(vec![Step::Quality(GopherQuality::with_min_words(50))]);

        let out1 = dir.path().join("out1.warc.gz");
        let out2 = dir.path().join("out2.warc.gz");
        FilterPipeline::process_shard(&input, &out1, &chain(), &ModelPaths::default()).unwrap();
        FilterPipeline::process_shard(&input, &out2, &chain(), &ModelPaths::default()).unwrap();

        assert_eq!(std::fs::read(&out1).unwrap(), std::fs::read(&out2).unwrap());
    }
}
