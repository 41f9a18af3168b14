//! Pipeline trait.
use crate::error::Error;

/// This trait must be implemented for each pipeline, and is generic
/// over the return type so that pipelines that hand results back to
/// their caller can use the trait as well.
pub trait Pipeline<T> {
    fn run(&self) -> Result<T, Error>;
}
