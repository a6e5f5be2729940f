//! Mock sequence models for testing
//!
//! Stand-ins for the Candle backends so the classifier and service can be
//! exercised without model weights.

#![allow(dead_code)]

use candle_core::{DType, Device, Tensor};
use fakecheck_classifiers::{EncodedBatch, SequenceClassificationModel, TextClassifier};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokenizers::Tokenizer;

/// Token id of "slow" in the test vocabulary
pub const SLOW_TOKEN: u32 = 5;

pub const TOKENIZER_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": {"type": "Lowercase"},
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"[PAD]": 0, "[UNK]": 1, "breaking": 2, "news": 3, "today": 4, "slow": 5, "the": 6, "sky": 7, "is": 8, "blue": 9},
        "unk_token": "[UNK]"
    }
}"#;

pub fn tokenizer() -> Tokenizer {
    Tokenizer::from_str(TOKENIZER_JSON).unwrap()
}

/// Counts forward passes and tracks how many overlap
#[derive(Clone, Default)]
pub struct CallStats {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl CallStats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// What a mock model does on each forward pass
#[derive(Clone, Copy)]
pub enum Behavior {
    /// Same `[fake, real]` logits for every row
    Fixed([f32; 2]),
    /// Fake logit 2.0, real logit = number of attended tokens
    LengthScore,
    /// Candle error
    Fail,
    /// Panic inside the forward pass
    Panic,
}

/// A configurable mock model
pub struct MockModel {
    behavior: Behavior,
    latency: Option<Duration>,
    slow_only: bool,
    stats: CallStats,
    device: Device,
}

impl MockModel {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            latency: None,
            slow_only: false,
            stats: CallStats::default(),
            device: Device::Cpu,
        }
    }

    /// Sleep on every forward pass
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Sleep only when the batch contains the word "slow"
    pub fn with_latency_on_slow(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self.slow_only = true;
        self
    }

    pub fn stats(&self) -> CallStats {
        self.stats.clone()
    }

    fn should_sleep(&self, batch: &EncodedBatch) -> candle_core::Result<bool> {
        if !self.slow_only {
            return Ok(true);
        }
        let ids = batch.input_ids.flatten_all()?.to_vec1::<u32>()?;
        Ok(ids.contains(&SLOW_TOKEN))
    }

    fn logits(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        let rows = batch.batch_size();
        match self.behavior {
            Behavior::Fixed(logits) => {
                let data: Vec<f32> = (0..rows).flat_map(|_| logits).collect();
                Tensor::from_vec(data, (rows, 2), &self.device)
            }
            Behavior::LengthScore => {
                let lengths = batch.attention_mask.to_dtype(DType::F32)?.sum_keepdim(1)?;
                let fake = (lengths.ones_like()? * 2.0)?;
                Tensor::cat(&[&fake, &lengths], 1)
            }
            Behavior::Fail => Err(candle_core::Error::Msg("mock forward failure".to_string())),
            Behavior::Panic => panic!("mock forward panic"),
        }
    }
}

impl SequenceClassificationModel for MockModel {
    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        self.stats.enter();
        let outcome = (|| {
            if let Some(latency) = self.latency {
                if self.should_sleep(batch)? {
                    std::thread::sleep(latency);
                }
            }
            self.logits(batch)
        })();
        self.stats.exit();
        outcome
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// Text classifier around a mock model, with its call stats
pub fn mock_classifier(model: MockModel, max_length: usize) -> (TextClassifier, CallStats) {
    let stats = model.stats();
    let classifier = TextClassifier::from_parts("mock", tokenizer(), Box::new(model), max_length).unwrap();
    (classifier, stats)
}
