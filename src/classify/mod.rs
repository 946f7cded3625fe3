//! Food classification.
//!
//! The classifier is an external collaborator: it receives the path of the
//! captured image plus the closed label set and answers with one label.
//! Backends are registered by name in a `ClassifierRegistry`.

mod backend;
mod backends;
mod labels;
mod registry;

pub use backend::Classifier;
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use labels::{LabelSet, FOOD_LABELS};
pub use registry::{ClassifierRegistry, ClassifierSettings};
