//! Classifier trait

use async_trait::async_trait;
use fakecheck_core::{ClassificationResult, DatasetVerdict, Result};

/// Anything that can turn text into a fake/real verdict.
///
/// Request handlers hold an `Arc<dyn Classifier>` so tests can swap in a
/// double and several model versions can be served side by side.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Classify at a request boundary.
    ///
    /// Never fails: per-request errors become a tagged
    /// [`DatasetVerdict::Failed`] that the caller can store and show.
    async fn classify_for_record(&self, text: &str) -> DatasetVerdict {
        let outcome = self.classify(text).await;
        if let Err(e) = &outcome {
            tracing::warn!(
                classifier = self.name(),
                kind = e.kind().as_str(),
                "Classification failed, storing error verdict: {}",
                e
            );
        }
        DatasetVerdict::from_outcome(outcome)
    }
}
