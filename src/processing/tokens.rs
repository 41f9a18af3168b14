//! Token stream sink.
//!
//! Streams document text through a tokenizer and appends the ids to a
//! memory-mapped file of little-endian `u16` values. The file is
//! sized from a sampled estimate, then truncated to the true length
//! (two bytes per token) at the end.
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use glob::glob;
use log::{error, info};
use memmap2::MmapOptions;
use rayon::prelude::*;

use crate::error::Error;
use crate::io::reader::Shard;

/// Documents sampled for the size estimate.
const SAMPLE_DOCUMENTS: usize = 100;
/// Safety factor on top of the sampled estimate.
const ESTIMATE_SLACK: f64 = 1.2;

/// External tokenizer seam: deterministic `text -> ids`, plus the id
/// appended after every document.
pub trait Tokenize {
    fn encode(&self, text: &str) -> Vec<u32>;
    fn eos_id(&self) -> u32;
}

/// Fallback tokenizer: one id per byte, end-of-sequence at 256.
///
/// Useful for plumbing and tests; real runs plug a trained tokenizer
/// in behind [Tokenize].
pub struct ByteTokenizer;

impl Tokenize for ByteTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn eos_id(&self) -> u32 {
        256
    }
}

/// Write `texts` as one contiguous token stream at `dst`. Returns the
/// number of tokens written; the file ends up exactly twice that many
/// bytes long.
pub fn write_tokens<T: Tokenize>(tokenizer: &T, texts: &[String], dst: &Path) -> Result<u64, Error> {
    if texts.is_empty() {
        return Err(Error::Usage("no documents to tokenize".to_string()));
    }

    let sampled = texts.len().min(SAMPLE_DOCUMENTS);
    let sample_tokens: usize = texts[..sampled]
        .iter()
        .map(|text| tokenizer.encode(text).len() + 1)
        .sum();
    let estimated = ((sample_tokens as f64) * (texts.len() as f64 / sampled as f64)
        * ESTIMATE_SLACK)
        .ceil() as u64;
    info!("estimated {} tokens for {} documents", estimated, texts.len());

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(dst)?;
    file.set_len(estimated * 2)?;
    let mut map = unsafe {
        MmapOptions::new()
            .map_mut(&file)
            .map_err(|e| Error::ResourceExhausted(format!("mmap of {:?} failed: {}", dst, e)))?
    };

    let mut written: usize = 0;
    for text in texts {
        let mut ids = tokenizer.encode(text);
        ids.push(tokenizer.eos_id());
        for id in ids {
            if id > u32::from(u16::MAX) {
                return Err(Error::Custom(format!(
                    "token id {} does not fit in sixteen bits",
                    id
                )));
            }
            let offset = written * 2;
            if offset + 2 > map.len() {
                return Err(Error::ResourceExhausted(
                    "token estimate fell short of the actual stream".to_string(),
                ));
            }
            map[offset..offset + 2].copy_from_slice(&(id as u16).to_le_bytes());
            written += 1;
        }
    }

    map.flush()?;
    drop(map);
    file.set_len(written as u64 * 2)?;

    info!("wrote {} tokens to {:?}", written, dst);
    Ok(written as u64)
}

/// Tokenize every conversion record of every shard under `src`, in
/// shard order, into one token file.
///
/// Per-shard tokenization fans out unless `TOKENIZER_PARALLELISM` is
/// set to `false` or `0`.
pub fn tokenize_shards<T: Tokenize + Sync>(
    tokenizer: &T,
    src: &Path,
    dst: &Path,
) -> Result<u64, Error> {
    let shards = shard_paths(src)?;
    if shards.is_empty() {
        return Err(Error::Usage(format!("no shards found in {:?}", src)));
    }

    let parallel = std::env::var("TOKENIZER_PARALLELISM")
        .map(|value| value != "false" && value != "0")
        .unwrap_or(true);

    let texts: Vec<String> = if parallel {
        let per_shard: Vec<Vec<String>> = shards
            .par_iter()
            .map(|path| shard_texts(path))
            .collect::<Result<_, _>>()?;
        per_shard.into_iter().flatten().collect()
    } else {
        let mut texts = Vec::new();
        for path in &shards {
            texts.extend(shard_texts(path)?);
        }
        texts
    };

    write_tokens(tokenizer, &texts, dst)
}

fn shard_texts(path: &Path) -> Result<Vec<String>, Error> {
    Shard::from_path_gzip(path)?
        .text_records()
        .map(|record| record.map(|r| r.content))
        .collect()
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

#[cfg(test)]
mod tests {
    use super::{write_tokens, ByteTokenizer, Tokenize};

    #[test]
    fn test_file_is_exactly_two_bytes_per_token() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("tokens.bin");

        // 5 + 6 + 6 = 17 byte tokens, plus 3 EOS
        let texts = vec![
            "hello".to_string(),
            "worlds".to_string(),
            "abcdef".to_string(),
        ];
        let written = write_tokens(&ByteTokenizer, &texts, &dst).unwrap();

        assert_eq!(written, 20);
        assert_eq!(std::fs::metadata(&dst).unwrap().len(), 40);
    }

    #[test]
    fn test_stream_content_matches_concatenation() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("tokens.bin");

        let texts = vec!["ab".to_string(), "c".to_string()];
        write_tokens(&ByteTokenizer, &texts, &dst).unwrap();

        let bytes = std::fs::read(&dst).unwrap();
        let ids: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        let mut expected = Vec::new();
        for text in &texts {
            expected.extend(ByteTokenizer.encode(text).into_iter().map(|id| id as u16));
            expected.push(ByteTokenizer.eos_id() as u16);
        }
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_oversized_token_id_is_an_error() {
        struct Oversized;
        impl Tokenize for Oversized {
            fn encode(&self, _: &str) -> Vec<u32> {
                vec![70_000]
            }
            fn eos_id(&self) -> u32 {
                0
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("tokens.bin");
        let result = write_tokens(&Oversized, &["x".to_string()], &dst);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_documents_is_usage_error() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("tokens.bin");
        let result = write_tokens(&ByteTokenizer, &[], &dst);
        assert!(matches!(result, Err(crate::error::Error::Usage(_))));
    }
}
