//! Synchronous text classifier: tokenizer + sequence model + decision rule

use crate::decision;
use crate::model_config::ModelConfig;
use crate::model_loader::{self, LoadedModel};
use crate::sequence::{EncodedBatch, SequenceClassificationModel};
use fakecheck_core::types::ClassificationMetadata;
use fakecheck_core::{ClassificationRequest, ClassificationResult, Error, Result};
use std::time::Instant;
use tokenizers::{Encoding, Tokenizer};

/// A loaded fake/real classifier.
///
/// Owns its tokenizer and model; nothing is mutated after construction, so
/// the same input always yields the same result. Calls block the current
/// thread for the whole forward pass.
pub struct TextClassifier {
    name: String,
    tokenizer: Tokenizer,
    model: Box<dyn SequenceClassificationModel>,
    max_length: usize,
}

impl TextClassifier {
    /// Load the configured artifact
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let LoadedModel {
            name,
            architecture,
            tokenizer,
            model,
        } = model_loader::load_model(config)?;
        let classifier = Self::from_parts(name, tokenizer, model, config.max_length)?;

        tracing::info!(
            classifier = %classifier.name,
            %architecture,
            max_length = classifier.max_length,
            "Text classifier ready"
        );
        Ok(classifier)
    }

    /// Build around an already constructed model.
    ///
    /// The tokenizer is reconfigured to truncate at `max_length` and to pad
    /// batches to their longest member.
    pub fn from_parts(
        name: impl Into<String>,
        mut tokenizer: Tokenizer,
        model: Box<dyn SequenceClassificationModel>,
        max_length: usize,
    ) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::config("max_length must be greater than zero"));
        }
        model_loader::configure_tokenizer(&mut tokenizer, max_length)?;

        Ok(Self {
            name: name.into(),
            tokenizer,
            model,
            max_length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Classify one text
    pub fn predict(&self, text: &str) -> Result<ClassificationResult> {
        ClassificationRequest::validate(text)?;
        let start = Instant::now();

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::inference(format!("Tokenization failed: {}", e)))?;

        let mut results = self.run(std::slice::from_ref(&encoding), start)?;
        results
            .pop()
            .ok_or_else(|| Error::inference("Model returned no scores"))
    }

    /// Classify several texts in one padded forward pass.
    ///
    /// Results come back in input order. One blank text rejects the whole
    /// batch before any model work.
    pub fn predict_batch(&self, texts: &[&str]) -> Result<Vec<ClassificationResult>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for (idx, text) in texts.iter().enumerate() {
            ClassificationRequest::validate(text)
                .map_err(|e| Error::invalid_input(format!("batch item {}: {}", idx, e)))?;
        }
        let start = Instant::now();

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| Error::inference(format!("Tokenization failed: {}", e)))?;

        self.run(&encodings, start)
    }

    fn run(&self, encodings: &[Encoding], start: Instant) -> Result<Vec<ClassificationResult>> {
        let batch = EncodedBatch::from_encodings(encodings, self.model.device())
            .map_err(|e| Error::inference(format!("Failed to build input tensors: {}", e)))?;

        let logits = self
            .model
            .forward(&batch)
            .map_err(|e| Error::inference(format!("Model forward pass failed: {}", e)))?;

        let probabilities = decision::probabilities(&logits)?;
        if probabilities.len() != encodings.len() {
            return Err(Error::inference(format!(
                "Model returned {} score rows for {} inputs",
                probabilities.len(),
                encodings.len()
            )));
        }

        let latency_us = start.elapsed().as_micros() as u64;
        let results = encodings
            .iter()
            .zip(probabilities)
            .map(|(encoding, probs)| {
                let token_count = encoding.get_attention_mask().iter().filter(|&&m| m != 0).count();
                let truncated = !encoding.get_overflowing().is_empty();
                tracing::debug!(
                    classifier = %self.name,
                    token_count,
                    truncated,
                    p_fake = probs[0],
                    p_real = probs[1],
                    "Classified text"
                );

                decision::classify_probabilities(probs).with_metadata(ClassificationMetadata {
                    model: Some(self.name.clone()),
                    probabilities: Some(probs),
                    token_count,
                    truncated,
                    latency_us,
                })
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{Device, Tensor};
    use fakecheck_core::Label;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const TOKENIZER_JSON: &str = r#"{
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": null,
        "pre_tokenizer": {"type": "Whitespace"},
        "post_processor": null,
        "decoder": null,
        "model": {"type": "WordLevel", "vocab": {"[PAD]": 0, "[UNK]": 1, "breaking": 2, "news": 3, "today": 4}, "unk_token": "[UNK]"}
    }"#;

    /// Returns the same logits for every row and counts forward passes
    struct FixedLogits {
        logits: [f32; 2],
        calls: Arc<AtomicUsize>,
        device: Device,
    }

    impl SequenceClassificationModel for FixedLogits {
        fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let rows = batch.batch_size();
            let data: Vec<f32> = (0..rows).flat_map(|_| self.logits).collect();
            Tensor::from_vec(data, (rows, 2), &self.device)
        }

        fn device(&self) -> &Device {
            &self.device
        }
    }

    /// Scores Real by how many tokens survive truncation
    struct LengthScorer {
        device: Device,
    }

    impl SequenceClassificationModel for LengthScorer {
        fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
            let lengths = batch
                .attention_mask
                .to_dtype(candle_core::DType::F32)?
                .sum_keepdim(1)?;
            let fake = (lengths.ones_like()? * 2.0)?;
            Tensor::cat(&[&fake, &lengths], 1)
        }

        fn device(&self) -> &Device {
            &self.device
        }
    }

    fn classifier(logits: [f32; 2], max_length: usize) -> (TextClassifier, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = FixedLogits {
            logits,
            calls: calls.clone(),
            device: Device::Cpu,
        };
        let tokenizer = Tokenizer::from_str(TOKENIZER_JSON).unwrap();
        let classifier = TextClassifier::from_parts("fixed", tokenizer, Box::new(model), max_length).unwrap();
        (classifier, calls)
    }

    #[test]
    fn test_predict_real() {
        let (classifier, calls) = classifier([0.0, 2.0_f32.ln()], 256);
        let result = classifier.predict("breaking news today").unwrap();

        assert_eq!(result.label, Label::Real);
        assert_eq!(result.confidence, 0.6667);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let metadata = result.metadata;
        assert_eq!(metadata.model.as_deref(), Some("fixed"));
        assert_eq!(metadata.token_count, 3);
        assert!(!metadata.truncated);
    }

    #[test]
    fn test_predict_fake() {
        let (classifier, _) = classifier([3.0, -1.0], 256);
        let result = classifier.predict("news").unwrap();
        assert_eq!(result.label, Label::Fake);
        assert!(result.confidence > 0.98);
    }

    #[test]
    fn test_blank_input_skips_model() {
        let (classifier, calls) = classifier([0.0, 1.0], 256);

        assert!(matches!(classifier.predict(""), Err(Error::InvalidInput(_))));
        assert!(matches!(classifier.predict(" \n\t "), Err(Error::InvalidInput(_))));
        assert!(matches!(
            classifier.predict_batch(&["news", "  "]),
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let (classifier, _) = classifier([0.0, 1.0], 4);
        let text = "breaking news today ".repeat(50);

        let result = classifier.predict(&text).unwrap();
        let metadata = result.metadata;
        assert_eq!(metadata.token_count, 4);
        assert!(metadata.truncated);
    }

    #[test]
    fn test_same_input_same_output() {
        let (classifier, _) = classifier([0.3, 0.7], 256);
        let first = classifier.predict("breaking news").unwrap();
        let second = classifier.predict("breaking news").unwrap();
        assert_eq!(first.label, second.label);
        assert_eq!(first.confidence, second.confidence);
        assert_eq!(
            first.metadata.probabilities,
            second.metadata.probabilities
        );
    }

    #[test]
    fn test_batch_preserves_order() {
        let tokenizer = Tokenizer::from_str(TOKENIZER_JSON).unwrap();
        let model = LengthScorer { device: Device::Cpu };
        let classifier = TextClassifier::from_parts("length", tokenizer, Box::new(model), 256).unwrap();

        // fake logit is 2.0, real logit is the token count
        let results = classifier
            .predict_batch(&["news", "breaking news today", "breaking news today news"])
            .unwrap();

        let labels: Vec<Label> = results.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![Label::Fake, Label::Real, Label::Real]);
        assert_eq!(results[0].metadata.token_count, 1);
        assert_eq!(results[2].metadata.token_count, 4);

        let single = classifier.predict("news").unwrap();
        assert_eq!(single.label, results[0].label);
        assert_eq!(single.confidence, results[0].confidence);
    }

    #[test]
    fn test_empty_batch() {
        let (classifier, calls) = classifier([0.0, 1.0], 256);
        assert!(classifier.predict_batch(&[]).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_zero_max_length_rejected() {
        let tokenizer = Tokenizer::from_str(TOKENIZER_JSON).unwrap();
        let model = FixedLogits {
            logits: [0.0, 0.0],
            calls: Arc::new(AtomicUsize::new(0)),
            device: Device::Cpu,
        };
        let result = TextClassifier::from_parts("fixed", tokenizer, Box::new(model), 0);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
