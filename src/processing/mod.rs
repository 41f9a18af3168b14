/*! Corpus-level processing stages.

These run after filtering: exact-line deduplication, MinHash
near-duplicate removal, and the token stream sink.
!*/
pub mod dedup;
pub mod minhash;
pub mod tokens;
