//! fakecheck Classifiers
//!
//! Binary fake/real news classification on top of a pretrained
//! sequence-classification model.
//!
//! The path from text to verdict:
//! - [`model_loader`] resolves the artifact directory and loads tokenizer and weights
//! - [`sequence`] runs the architecture-specific forward pass to two logits
//! - [`decision`] turns logits into a label and a confidence
//! - [`TextClassifier`] ties these together synchronously
//! - [`InferenceService`] owns a classifier on a worker thread and serves async callers

pub mod classifier;
pub mod decision;
pub mod model_config;
pub mod model_loader;
pub mod sequence;
pub mod service;
pub mod text_classifier;

pub use classifier::Classifier;
pub use model_config::{DeviceSpec, FakecheckConfig, ModelConfig, ModelSource, ServiceConfig};
pub use model_loader::Architecture;
pub use sequence::{EncodedBatch, SequenceClassificationModel};
pub use service::InferenceService;
pub use text_classifier::TextClassifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::Classifier;
    pub use crate::model_config::{FakecheckConfig, ModelConfig, ServiceConfig};
    pub use crate::service::InferenceService;
    pub use crate::text_classifier::TextClassifier;
    pub use fakecheck_core::{ClassificationResult, DatasetVerdict, Label};
}
