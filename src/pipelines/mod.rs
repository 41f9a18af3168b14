//! Pipelines.
//!
//! The module provides a light [pipeline::Pipeline] trait and the
//! shard filtering pipeline, along with the counter and predicate
//! chain types it is built from.
pub mod chain;
pub mod counter;
pub mod filter;
#[allow(clippy::module_inception)]
pub mod pipeline;

pub use chain::{Chain, Step};
pub use counter::FilterCounter;
pub use filter::{FilterPipeline, FilterReport};
pub use pipeline::Pipeline;
