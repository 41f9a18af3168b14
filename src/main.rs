use log::LevelFilter;
use structopt::StructOpt;

use shelob::cli;
use shelob::download::Fetcher;
use shelob::error::Error;
use shelob::filtering::gopher::GopherQuality;
use shelob::identifiers::{ModelPaths, PredictorKind};
use shelob::pipelines::{Chain, FilterPipeline, Pipeline, Step};
use shelob::processing;
use shelob::processing::tokens::ByteTokenizer;

#[macro_use]
extern crate log;

#[tokio::main]
async fn main() {
    // default log level is info
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_env("RUST_LOG");
    builder.init();

    let opt = cli::Shelob::from_args();
    debug!("cli args\n{:#?}", opt);

    match run(opt).await {
        Ok(0) => (),
        Ok(failed) => {
            error!("{} worker(s) failed", failed);
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:?}", e);
            std::process::exit(e.exit_code());
        }
    }
}

/// Dispatch a subcommand; the returned number is how many workers
/// failed without aborting the run.
async fn run(opt: cli::Shelob) -> Result<usize, Error> {
    match opt {
        cli::Shelob::Fetch(f) => {
            let fetcher = Fetcher::from_urls_file(&f.urls_file, f.concurrent)?;
            let report = fetcher.run(&f.dst).await?;
            Ok(report.failed)
        }
        cli::Shelob::Filter(f) => {
            let quality_kind = match f.quality_label.as_str() {
                "c4" => PredictorKind::QualityC4,
                "wiki" => PredictorKind::QualityWiki,
                other => {
                    return Err(Error::Usage(format!(
                        "unknown quality label {:?} (expected c4 or wiki)",
                        other
                    )))
                }
            };

            let mut steps = vec![
                Step::Language {
                    lang: "en".to_string(),
                    threshold: 0.8,
                },
                Step::Quality(GopherQuality::with_min_words(f.min_words)),
            ];
            if f.mask_pii {
                steps.push(Step::MaskPii);
            }
            if f.nsfw_model.is_some() {
                steps.push(Step::Nsfw { threshold: 0.8 });
            }
            if f.toxic_model.is_some() {
                steps.push(Step::Toxic { threshold: 0.8 });
            }
            if f.quality_model.is_some() {
                steps.push(Step::ModelQuality { kind: quality_kind });
            }

            let mut paths = ModelPaths {
                lang: Some(f.lid_path),
                nsfw: f.nsfw_model,
                toxic: f.toxic_model,
                ..Default::default()
            };
            match quality_kind {
                PredictorKind::QualityWiki => paths.quality_wiki = f.quality_model,
                _ => paths.quality_c4 = f.quality_model,
            }

            let pipeline = FilterPipeline::new(
                f.src,
                f.dst,
                Chain::new(steps),
                paths,
                f.workers,
                f.max_shards,
            );
            let report = pipeline.run()?;
            Ok(report.failed_shards)
        }
        cli::Shelob::Dedup(d) => {
            let report =
                processing::dedup::dedup(&d.src, &d.dst, d.table_size, d.cap, d.workers)?;
            Ok(report.failed_shards)
        }
        cli::Shelob::Minhash(m) => {
            let params = processing::minhash::MinhashParams {
                num_hashes: m.num_hashes,
                num_bands: m.num_bands,
                ngram_size: m.ngram_size,
                jaccard_threshold: m.jaccard_threshold,
            };
            let report = processing::minhash::minhash_dedup(&m.src, &m.dst, &params)?;
            Ok(report.failed_documents)
        }
        cli::Shelob::Tokenize(t) => {
            processing::tokens::tokenize_shards(&ByteTokenizer, &t.src, &t.dst)?;
            Ok(0)
        }
    }
}
