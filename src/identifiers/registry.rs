//! Worker-local predictor registry.
//!
//! Model handles are not shared between workers: each worker thread
//! owns a lazily populated cache, keyed by predictor kind. Models are
//! loaded on first use and never evicted during a run.
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::Error;
use crate::identifiers::model::{Classifier, Predict, Prediction};

/// The predictors a run may need.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictorKind {
    Lang,
    Nsfw,
    Toxic,
    QualityC4,
    QualityWiki,
}

/// Model locations, handed from the orchestrator to every worker.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModelPaths {
    pub lang: Option<PathBuf>,
    pub nsfw: Option<PathBuf>,
    pub toxic: Option<PathBuf>,
    pub quality_c4: Option<PathBuf>,
    pub quality_wiki: Option<PathBuf>,
}

impl ModelPaths {
    fn get(&self, kind: PredictorKind) -> Option<&Path> {
        match kind {
            PredictorKind::Lang => self.lang.as_deref(),
            PredictorKind::Nsfw => self.nsfw.as_deref(),
            PredictorKind::Toxic => self.toxic.as_deref(),
            PredictorKind::QualityC4 => self.quality_c4.as_deref(),
            PredictorKind::QualityWiki => self.quality_wiki.as_deref(),
        }
    }
}

/// Lazy cache of loaded classifiers.
pub struct Registry {
    paths: ModelPaths,
    cache: RefCell<HashMap<PredictorKind, Classifier>>,
}

impl Registry {
    pub fn new(paths: ModelPaths) -> Self {
        Self {
            paths,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Predict with the given kind's model, loading it on first use.
    pub fn predict(&self, kind: PredictorKind, text: &str) -> Result<Option<Prediction>, Error> {
        let mut cache = self.cache.borrow_mut();
        if !cache.contains_key(&kind) {
            let path = self.paths.get(kind).ok_or_else(|| {
                Error::Usage(format!("no model path configured for {:?}", kind))
            })?;
            info!("loading {:?} model from {:?}", kind, path);
            cache.insert(kind, Classifier::from_path(path)?);
        }

        // just inserted above if absent
        cache.get(&kind).unwrap().predict(text)
    }
}

thread_local! {
    static REGISTRY: RefCell<Option<Registry>> = RefCell::new(None);
}

/// Run `f` against this worker's registry, creating it on first use.
///
/// The registry is rebuilt if a different set of model paths shows up,
/// so two successive runs in one process do not mix models.
pub fn with_registry<R>(paths: &ModelPaths, f: impl FnOnce(&Registry) -> R) -> R {
    REGISTRY.with(|slot| {
        let mut slot = slot.borrow_mut();
        let stale = slot.as_ref().map(|r| &r.paths != paths).unwrap_or(true);
        if stale {
            *slot = Some(Registry::new(paths.clone()));
        }

        // filled right above
        f(slot.as_ref().unwrap())
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{with_registry, ModelPaths, PredictorKind};

    #[test]
    fn test_missing_path_is_usage_error() {
        let paths = ModelPaths::default();
        let result = with_registry(&paths, |registry| {
            registry.predict(PredictorKind::Nsfw, "some text")
        });
        assert!(matches!(result, Err(crate::error::Error::Usage(_))));
    }

    #[test]
    fn test_registry_rebuilds_on_new_paths() {
        let first = ModelPaths {
            lang: Some(PathBuf::from("a.bin")),
            ..Default::default()
        };
        let second = ModelPaths {
            lang: Some(PathBuf::from("b.bin")),
            ..Default::default()
        };

        // neither model exists: both loads must fail, and the second
        // call must not be served by the first registry's cache state
        let first_result =
            with_registry(&first, |registry| registry.predict(PredictorKind::Lang, "text"));
        let second_result =
            with_registry(&second, |registry| registry.predict(PredictorKind::Lang, "text"));
        assert!(first_result.is_err());
        assert!(second_result.is_err());
    }
}
