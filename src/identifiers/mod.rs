/*! Model-backed text classifiers.

Classifiers (language identification, nsfw/toxic detection, quality
scoring) implement [Predict] and return a label with a confidence.
Thresholding is the caller's business. Models are loaded lazily
through a worker-local [Registry].
!*/
pub mod model;
pub mod registry;

pub use model::{Classifier, Predict, Prediction};
pub use registry::{with_registry, ModelPaths, PredictorKind, Registry};
