//! MinHash near-duplicate detection.
//!
//! Documents are reduced to sets of k-shingles over preprocessed
//! text, sketched into length-H signatures, bucketed band by band,
//! and candidate pairs that share a band key are verified with exact
//! Jaccard over the preserved shingle sets. Verified pairs are merged
//! in a union-find; each equivalence class keeps its first-inserted
//! member, whose source file is copied to the output directory.
use std::collections::{HashMap, HashSet};
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use log::{error, info, warn};
use rayon::prelude::*;
use twox_hash::XxHash32;
use unic_ucd::GeneralCategory;
use unicode_normalization::UnicodeNormalization;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct MinhashParams {
    pub num_hashes: usize,
    pub num_bands: usize,
    pub ngram_size: usize,
    pub jaccard_threshold: f64,
}

impl MinhashParams {
    fn validate(&self) -> Result<(), Error> {
        if self.num_bands == 0 || self.num_hashes % self.num_bands != 0 {
            return Err(Error::Usage(format!(
                "number of bands ({}) must divide the number of hashes ({})",
                self.num_bands, self.num_hashes
            )));
        }
        if self.ngram_size == 0 {
            return Err(Error::Usage("shingle size must be positive".to_string()));
        }
        Ok(())
    }

    fn rows_per_band(&self) -> usize {
        self.num_hashes / self.num_bands
    }
}

impl Default for MinhashParams {
    fn default() -> Self {
        Self {
            num_hashes: 100,
            num_bands: 20,
            ngram_size: 5,
            jaccard_threshold: 0.8,
        }
    }
}

/// Canonical text form: lowercase, single spaces, no punctuation, no
/// combining marks.
pub fn preprocess(text: &str) -> String {
    let text = text.to_lowercase();
    let text = text.split_whitespace().join(" ");
    let text: String = text
        .chars()
        .filter(|c| !GeneralCategory::of(*c).is_punctuation())
        .collect();
    text.nfd()
        .filter(|c| GeneralCategory::of(*c) != GeneralCategory::NonspacingMark)
        .collect()
}

/// Contiguous k-shingles over whitespace tokens. Fewer than k tokens
/// give the empty set.
pub fn shingles(text: &str, k: usize) -> HashSet<String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < k {
        return HashSet::new();
    }
    (0..=tokens.len() - k)
        .map(|start| tokens[start..start + k].join(" "))
        .collect()
}

fn hash_shingle(shingle: &str, seed: u32) -> u32 {
    let mut hasher = XxHash32::with_seed(seed);
    hasher.write(shingle.as_bytes());
    hasher.finish() as u32
}

/// Length-H vector of per-seed minima. The empty shingle set sketches
/// to all-max, so empty documents collide in every band but never
/// verify (their Jaccard is zero).
pub fn signature(shingles: &HashSet<String>, num_hashes: usize) -> Vec<u32> {
    (0..num_hashes)
        .map(|seed| {
            shingles
                .iter()
                .map(|shingle| hash_shingle(shingle, seed as u32))
                .min()
                .unwrap_or(u32::MAX)
        })
        .collect()
}

pub struct MinhashDocument {
    pub path: PathBuf,
    pub shingles: HashSet<String>,
}

/// Document arena with union-find over indices.
///
/// Documents are stored in insertion order; `parent` reparenting
/// replaces the back-references a pointer design would need.
#[derive(Default)]
pub struct DocumentSet {
    docs: Vec<MinhashDocument>,
    parent: Vec<usize>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, doc: MinhashDocument) -> usize {
        let id = self.docs.len();
        self.docs.push(doc);
        self.parent.push(id);
        id
    }

    /// Iterative find with full path compression.
    pub fn find(&mut self, id: usize) -> usize {
        let mut root = id;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        let mut walk = id;
        while self.parent[walk] != root {
            let next = self.parent[walk];
            self.parent[walk] = root;
            walk = next;
        }
        root
    }

    /// Merge the classes of `a` and `b`, reparenting `b`'s root onto
    /// `a`'s.
    pub fn union(&mut self, a: usize, b: usize) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent[root_b] = root_a;
        }
    }

    /// Exact Jaccard over the two documents' shingle sets.
    pub fn jaccard(&self, a: usize, b: usize) -> f64 {
        let left = &self.docs[a].shingles;
        let right = &self.docs[b].shingles;
        let union = left.union(right).count();
        if union == 0 {
            return 0.0;
        }
        let intersection = left.intersection(right).count();
        (intersection as f64) / (union as f64)
    }

    pub fn doc(&self, id: usize) -> &MinhashDocument {
        &self.docs[id]
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

/// Verify and merge every candidate pair inside one band bucket.
///
/// Jaccard is computed between the current class roots, as unioning
/// grows classes while the bucket is walked.
fn unify_bucket(set: &mut DocumentSet, bucket: &[usize], threshold: f64) {
    for i in 0..bucket.len() {
        for j in (i + 1)..bucket.len() {
            let root_a = set.find(bucket[i]);
            let root_b = set.find(bucket[j]);
            if root_a == root_b {
                continue;
            }
            if set.jaccard(root_a, root_b) >= threshold {
                set.parent[root_b] = root_a;
            }
        }
    }
}

/// Outcome of a minhash run.
#[derive(Debug)]
pub struct MinhashReport {
    pub total: usize,
    pub kept: usize,
    pub failed_documents: usize,
}

/// Near-duplicate removal over every file in `src`; representatives
/// are copied to `dst`.
pub fn minhash_dedup(src: &Path, dst: &Path, params: &MinhashParams) -> Result<MinhashReport, Error> {
    params.validate()?;

    let files = document_paths(src)?;
    if files.is_empty() {
        return Err(Error::Usage(format!("no documents found in {:?}", src)));
    }
    if !dst.exists() {
        warn!("Destination directory does not exist. Creating");
        std::fs::create_dir_all(dst)?;
    }

    info!(
        "sketching {} documents (H={}, B={}, k={}, threshold={})",
        files.len(),
        params.num_hashes,
        params.num_bands,
        params.ngram_size,
        params.jaccard_threshold
    );

    // signatures are independent per document: fan out, merge in
    // insertion order
    let sketches: Vec<(PathBuf, Result<(HashSet<String>, Vec<u32>), Error>)> = files
        .par_iter()
        .map(|path| {
            let result = std::fs::read_to_string(path)
                .map_err(Error::from)
                .map(|text| {
                    let text = preprocess(&text);
                    let doc_shingles = shingles(&text, params.ngram_size);
                    let doc_signature = signature(&doc_shingles, params.num_hashes);
                    (doc_shingles, doc_signature)
                });
            (path.clone(), result)
        })
        .collect();

    let rows = params.rows_per_band();
    let mut set = DocumentSet::new();
    let mut buckets: Vec<HashMap<Vec<u32>, Vec<usize>>> = vec![HashMap::new(); params.num_bands];
    let mut failed_documents = 0;

    for (path, sketch) in sketches {
        match sketch {
            Ok((doc_shingles, doc_signature)) => {
                let id = set.push(MinhashDocument {
                    path,
                    shingles: doc_shingles,
                });
                for band in 0..params.num_bands {
                    let key = doc_signature[band * rows..(band + 1) * rows].to_vec();
                    buckets[band].entry(key).or_default().push(id);
                }
            }
            Err(e) => {
                failed_documents += 1;
                error!("Error sketching document {:?}: {:?}", path, e);
            }
        }
    }

    for band_buckets in &buckets {
        for bucket in band_buckets.values() {
            unify_bucket(&mut set, bucket, params.jaccard_threshold);
        }
    }
    // band buckets are transient: done with candidates, release them
    drop(buckets);

    let mut kept = 0;
    let mut emitted: HashSet<usize> = HashSet::new();
    for id in 0..set.len() {
        let root = set.find(id);
        if !emitted.insert(root) {
            continue;
        }
        let doc = set.doc(root);
        let name = doc
            .path
            .file_name()
            .ok_or_else(|| Error::Custom(format!("no file name in {:?}", doc.path)))?;
        std::fs::copy(&doc.path, dst.join(name))?;
        kept += 1;
    }

    info!("kept {}/{} documents", kept, set.len());
    Ok(MinhashReport {
        total: set.len(),
        kept,
        failed_documents,
    })
}

fn document_paths(src: &Path) -> Result<Vec<PathBuf>, Error> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(src)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                error!("error reading document directory: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::{
        preprocess, shingles, signature, unify_bucket, DocumentSet, MinhashDocument,
    };

    fn doc(shingle_items: &[&str]) -> MinhashDocument {
        MinhashDocument {
            path: PathBuf::new(),
            shingles: shingle_items.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_preprocess() {
        let text = "This is a sample text! It includes punctuation, accents like café, and    irregular   spacing.";
        let cleaned = preprocess(text);
        assert_eq!(
            cleaned,
            "this is a sample text it includes punctuation accents like cafe and irregular spacing"
        );
    }

    #[test]
    fn test_shingles_basic() {
        let got = shingles("a b c d", 2);
        let expected: HashSet<String> = ["a b", "b c", "c d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn test_too_few_tokens_give_empty_set() {
        assert!(shingles("one two", 5).is_empty());
    }

    #[test]
    fn test_empty_signature_is_all_max() {
        let empty = HashSet::new();
        let sig = signature(&empty, 16);
        assert_eq!(sig.len(), 16);
        assert!(sig.iter().all(|v| *v == u32::MAX));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let set: HashSet<String> = ["quick brown fox", "brown fox jumps"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(signature(&set, 32), signature(&set, 32));
    }

    #[test]
    fn test_identical_sets_share_signatures() {
        let a: HashSet<String> = ["x y z", "y z w"].iter().map(|s| s.to_string()).collect();
        let b = a.clone();
        assert_eq!(signature(&a, 64), signature(&b, 64));
    }

    #[test]
    fn test_find_compresses_paths() {
        let mut set = DocumentSet::new();
        for _ in 0..4 {
            set.push(doc(&["s"]));
        }
        // chain 3 -> 2 -> 1 -> 0
        set.parent[1] = 0;
        set.parent[2] = 1;
        set.parent[3] = 2;

        assert_eq!(set.find(3), 0);
        // compressed: every node points at the root now
        assert_eq!(set.parent, vec![0, 0, 0, 0]);
        // idempotent
        assert_eq!(set.find(3), 0);
    }

    #[test]
    fn test_union_merges_classes() {
        let mut set = DocumentSet::new();
        for _ in 0..3 {
            set.push(doc(&["s"]));
        }
        set.union(0, 1);
        set.union(1, 2);
        assert_eq!(set.find(2), set.find(0));
        assert_eq!(set.find(1), set.find(0));
    }

    #[test]
    fn test_jaccard() {
        let mut set = DocumentSet::new();
        set.push(doc(&["a", "b", "c"]));
        set.push(doc(&["b", "c", "d"]));
        assert!((set.jaccard(0, 1) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_documents_do_not_unify() {
        // empty shingle sets collide in every band but verify to a
        // Jaccard of zero
        let mut set = DocumentSet::new();
        set.push(doc(&[]));
        set.push(doc(&[]));

        unify_bucket(&mut set, &[0, 1], 0.8);
        assert_ne!(set.find(0), set.find(1));
    }

    #[test]
    fn test_near_duplicates_unify_first_inserted_wins() {
        let shared: Vec<String> = (0..99).map(|i| format!("shingle number {}", i)).collect();
        let mut left: Vec<&str> = shared.iter().map(String::as_str).collect();
        let mut right = left.clone();
        left.push("only in left");
        right.push("only in right");

        let mut set = DocumentSet::new();
        set.push(doc(&left));
        set.push(doc(&right));

        unify_bucket(&mut set, &[0, 1], 0.8);
        assert_eq!(set.find(1), 0);
    }
}
