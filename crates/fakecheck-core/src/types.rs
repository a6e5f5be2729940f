//! Core types for fakecheck

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary authenticity label.
///
/// The discriminant is the class index of the model head: logits arrive in
/// the order `[Fake, Real]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Fake = 0,
    Real = 1,
}

impl Label {
    /// Number of classes the model head must produce
    pub const COUNT: usize = 2;

    /// All labels in class-index order
    pub const ALL: [Label; 2] = [Label::Fake, Label::Real];

    /// Class index in the model output
    pub fn index(self) -> usize {
        self as usize
    }

    /// Label for a class index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The literal string callers compare against
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fake => "Fake",
            Self::Real => "Real",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Fake" => Ok(Self::Fake),
            "Real" => Ok(Self::Real),
            other => Err(Error::malformed(format!("unknown label '{}'", other))),
        }
    }
}

/// Text submitted for classification.
///
/// Construction validates the text, so a request that exists is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    text: String,
}

impl ClassificationRequest {
    /// Create a request, rejecting empty or whitespace-only text
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        Self::validate(&text)?;
        Ok(Self { text })
    }

    /// Check text without taking ownership
    pub fn validate(text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(Error::invalid_input("text is empty or whitespace only"));
        }
        Ok(())
    }

    /// Raw text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the request and return the text
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Result of classification.
///
/// Serializes to exactly `{"label": ..., "confidence": ...}`; metadata stays
/// in process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted label
    pub label: Label,

    /// Probability of the predicted label, rounded to 4 decimal digits
    pub confidence: f32,

    /// Details that are not part of the output shape
    #[serde(skip)]
    pub metadata: ClassificationMetadata,
}

impl ClassificationResult {
    /// Create a new classification result, rounding the confidence
    pub fn new(label: Label, confidence: f32) -> Self {
        Self {
            label,
            confidence: round_confidence(confidence),
            metadata: ClassificationMetadata::default(),
        }
    }

    /// Attach metadata
    pub fn with_metadata(mut self, metadata: ClassificationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_real(&self) -> bool {
        self.label == Label::Real
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationMetadata {
    /// Model name or version
    pub model: Option<String>,

    /// Unrounded class probabilities in `[Fake, Real]` order
    pub probabilities: Option<[f32; 2]>,

    /// Tokens fed to the model, special tokens included
    pub token_count: usize,

    /// Whether the input was cut at the maximum token length
    pub truncated: bool,

    /// Latency in microseconds
    pub latency_us: u64,
}

/// What the request layer stores for a submitted post.
///
/// Either the classification or a clearly tagged error; never a raw failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatasetVerdict {
    Classified(ClassificationResult),
    Failed { error: String },
}

impl DatasetVerdict {
    /// Convert a per-request outcome into a storable verdict
    pub fn from_outcome(outcome: Result<ClassificationResult>) -> Self {
        match outcome {
            Ok(result) => Self::Classified(result),
            Err(e) => Self::Failed {
                error: e.to_string(),
            },
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, Self::Classified(_))
    }

    /// The classification, if there is one
    pub fn result(&self) -> Option<&ClassificationResult> {
        match self {
            Self::Classified(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }

    /// JSON text for the `dataset_result` column
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Round a probability to 4 decimal digits.
///
/// Exact ties go to the even digit, so `0.53125` becomes `0.5312`. The
/// scaled value is exact in `f64`, which makes the tie test reliable.
pub fn round_confidence(p: f32) -> f32 {
    let scaled = p as f64 * 10_000.0;
    let floor = scaled.floor();
    let rounded = if scaled - floor == 0.5 {
        if floor % 2.0 == 0.0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    (rounded / 10_000.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_index_roundtrip() {
        assert_eq!(Label::Fake.index(), 0);
        assert_eq!(Label::Real.index(), 1);
        assert_eq!(Label::from_index(1), Some(Label::Real));
        assert_eq!(Label::from_index(2), None);
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(Label::Real.to_string(), "Real");
        assert_eq!("Fake".parse::<Label>().unwrap(), Label::Fake);
        assert!("real".parse::<Label>().is_err());
    }

    #[test]
    fn test_request_rejects_blank_text() {
        assert!(ClassificationRequest::new("").is_err());
        assert!(ClassificationRequest::new("  \n\t ").is_err());

        let request = ClassificationRequest::new(" breaking news ").unwrap();
        assert_eq!(request.text(), " breaking news ");
    }

    #[test]
    fn test_round_confidence() {
        assert_eq!(round_confidence(0.987_654), 0.9877);
        assert_eq!(round_confidence(0.5), 0.5);
        assert_eq!(round_confidence(0.999_99), 1.0);
    }

    #[test]
    fn test_round_confidence_ties_to_even() {
        // Odd multiples of 1/32 are exact binary ties at the fifth digit
        assert_eq!(round_confidence(0.53125), 0.5312);
        assert_eq!(round_confidence(0.59375), 0.5938);
        assert_eq!(round_confidence(0.65625), 0.6562);
        assert_eq!(round_confidence(0.53126), 0.5313);
    }

    #[test]
    fn test_result_serializes_two_keys() {
        let result = ClassificationResult::new(Label::Real, 0.912_34).with_metadata(
            ClassificationMetadata {
                model: Some("deberta".to_string()),
                token_count: 12,
                ..Default::default()
            },
        );

        let json: serde_json::Value = serde_json::to_value(&result).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj["label"], "Real");
        assert!((obj["confidence"].as_f64().unwrap() - 0.9123).abs() < 1e-6);
    }

    #[test]
    fn test_dataset_verdict_shapes() {
        let ok = DatasetVerdict::from_outcome(Ok(ClassificationResult::new(Label::Fake, 0.75)));
        assert!(ok.is_classified());
        assert_eq!(ok.to_json().unwrap(), r#"{"label":"Fake","confidence":0.75}"#);

        let failed = DatasetVerdict::from_outcome(Err(Error::inference("forward pass failed")));
        assert!(!failed.is_classified());
        assert_eq!(
            failed.to_json().unwrap(),
            r#"{"error":"inference error: forward pass failed"}"#
        );

        let parsed: DatasetVerdict = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(
            parsed,
            DatasetVerdict::Failed {
                error: "boom".to_string()
            }
        );
    }
}
