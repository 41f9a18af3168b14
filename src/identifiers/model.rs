/*! fasttext classifier wrapper. !*/
use std::path::Path;

use fasttext::FastText as FastTextLib;
use itertools::Itertools;

use crate::error::Error;

/// A single top-1 prediction: cleaned label and confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub prob: f32,
}

/// Prediction trait.
///
/// Implementations must be deterministic: equal inputs give equal
/// predictions.
pub trait Predict {
    fn predict(&self, text: &str) -> Result<Option<Prediction>, Error>;
}

/// A fasttext model loaded from disk.
pub struct Classifier {
    inner: FastTextLib,
}

impl Classifier {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path
            .as_ref()
            .to_str()
            .ok_or_else(|| Error::Custom("could not parse model path".to_string()))?;
        let mut inner = FastTextLib::new();
        inner.load_model(path)?;
        Ok(Self { inner })
    }

    /// removes the `__label__` prefix fasttext puts on labels
    fn clean_label(label: &str) -> String {
        label.strip_prefix("__label__").unwrap_or(label).to_string()
    }
}

impl Predict for Classifier {
    fn predict(&self, text: &str) -> Result<Option<Prediction>, Error> {
        let line = flatten(text);
        if line.is_empty() {
            return Ok(None);
        }

        let predictions = self.inner.predict(&line, 1, 0.0)?;
        Ok(predictions.into_iter().next().map(|p| Prediction {
            label: Self::clean_label(&p.label),
            prob: p.prob,
        }))
    }
}

/// Normalize whitespace runs (newlines included) to single spaces and
/// trim, so models trained on one-line inputs see one line.
pub fn flatten(text: &str) -> String {
    text.split_whitespace().join(" ")
}
