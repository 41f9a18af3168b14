//! Command line arguments and parameters management/parsing.
use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "shelob", about = "A web-crawl filtering and deduplication pipeline")]
/// Holds every command that is callable by the `shelob` command.
pub enum Shelob {
    #[structopt(about = "Archive a list of URLs as WARC response records")]
    Fetch(Fetch),
    #[structopt(about = "Filter shards through the predicate chain")]
    Filter(Filter),
    #[structopt(about = "Exact-line deduplication over shards")]
    Dedup(Dedup),
    #[structopt(about = "MinHash near-duplicate removal over documents")]
    Minhash(Minhash),
    #[structopt(about = "Stream filtered records into a token file")]
    Tokenize(Tokenize),
}

#[derive(Debug, StructOpt)]
/// Fetch command and parameters.
pub struct Fetch {
    #[structopt(parse(from_os_str), help = "file holding one URL per line")]
    pub urls_file: PathBuf,
    #[structopt(parse(from_os_str), help = "destination WARC file")]
    pub dst: PathBuf,
    #[structopt(
        short = "c",
        long = "concurrent",
        help = "maximum in-flight requests",
        default_value = "32"
    )]
    pub concurrent: usize,
}

#[derive(Debug, StructOpt)]
/// Filter command and parameters.
///
/// `src` must contain gzipped WARC shards; surviving records are
/// written to `dst` under the same file names, along with a
/// `counters.json` report.
pub struct Filter {
    #[structopt(parse(from_os_str), help = "source (contains *.gz shards)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "filtered shards destination")]
    pub dst: PathBuf,
    #[structopt(
        parse(from_os_str),
        long = "lid-path",
        help = "Path to the language identification model",
        default_value = "lid.176.bin"
    )]
    pub lid_path: PathBuf,
    #[structopt(
        short = "w",
        long = "workers",
        help = "worker count cap. Defaults to the number of CPUs."
    )]
    pub workers: Option<usize>,
    #[structopt(short = "s", long = "shards", help = "only process the first n shards")]
    pub max_shards: Option<usize>,
    #[structopt(
        long = "min-words",
        help = "Gopher quality filter word floor",
        default_value = "50"
    )]
    pub min_words: usize,
    #[structopt(long = "mask-pii", help = "mask emails, phone numbers and IP addresses")]
    pub mask_pii: bool,
    #[structopt(
        parse(from_os_str),
        long = "nsfw-model",
        help = "drop nsfw-classified records using this model"
    )]
    pub nsfw_model: Option<PathBuf>,
    #[structopt(
        parse(from_os_str),
        long = "toxic-model",
        help = "drop toxic-classified records using this model"
    )]
    pub toxic_model: Option<PathBuf>,
    #[structopt(
        parse(from_os_str),
        long = "quality-model",
        help = "keep only records the quality classifier scores positive"
    )]
    pub quality_model: Option<PathBuf>,
    #[structopt(
        long = "quality-label",
        help = "positive label of the quality classifier (c4 or wiki)",
        default_value = "c4"
    )]
    pub quality_label: String,
}

#[derive(Debug, StructOpt)]
/// Dedup command and parameters.
pub struct Dedup {
    #[structopt(parse(from_os_str), help = "source (contains *.gz shards)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "deduplicated shards destination")]
    pub dst: PathBuf,
    #[structopt(
        short = "t",
        long = "table-size",
        help = "number of slots in the line count table",
        default_value = "1000000000"
    )]
    pub table_size: usize,
    #[structopt(
        short = "c",
        long = "cap",
        help = "saturation cap of each counter",
        default_value = "10"
    )]
    pub cap: u8,
    #[structopt(
        short = "w",
        long = "workers",
        help = "worker count cap. Defaults to the number of CPUs."
    )]
    pub workers: Option<usize>,
}

#[derive(Debug, StructOpt)]
/// Minhash command and parameters.
pub struct Minhash {
    #[structopt(parse(from_os_str), help = "source (contains text documents)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "representative documents destination")]
    pub dst: PathBuf,
    #[structopt(
        short = "H",
        long = "num-hashes",
        help = "signature length",
        default_value = "100"
    )]
    pub num_hashes: usize,
    #[structopt(
        short = "b",
        long = "num-bands",
        help = "number of LSH bands (must divide the signature length)",
        default_value = "20"
    )]
    pub num_bands: usize,
    #[structopt(
        short = "n",
        long = "ngram-size",
        help = "shingle size in tokens",
        default_value = "5"
    )]
    pub ngram_size: usize,
    #[structopt(
        short = "j",
        long = "jaccard-threshold",
        help = "exact-Jaccard verification threshold",
        default_value = "0.8"
    )]
    pub jaccard_threshold: f64,
}

#[derive(Debug, StructOpt)]
/// Tokenize command and parameters.
pub struct Tokenize {
    #[structopt(parse(from_os_str), help = "source (contains *.gz shards)")]
    pub src: PathBuf,
    #[structopt(parse(from_os_str), help = "destination token file")]
    pub dst: PathBuf,
}
