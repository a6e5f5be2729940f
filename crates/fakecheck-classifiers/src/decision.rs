//! Logits to verdict.
//!
//! Softmax over the two class logits, then `Real` iff `p(Real) >= p(Fake)`.
//! Ties go to `Real`. Confidence is the larger probability.

use candle_core::{DType, Tensor, D};
use fakecheck_core::{ClassificationResult, Error, Label, Result};

/// Softmax over a `[Fake, Real]` logit pair
pub fn softmax_pair(logits: [f32; 2]) -> [f32; 2] {
    let max = logits[0].max(logits[1]);
    let e0 = (logits[0] - max).exp();
    let e1 = (logits[1] - max).exp();
    let sum = e0 + e1;
    [e0 / sum, e1 / sum]
}

/// Label and unrounded confidence for a `[Fake, Real]` probability pair
pub fn decide(probabilities: [f32; 2]) -> (Label, f32) {
    let [p_fake, p_real] = probabilities;
    if p_real >= p_fake {
        (Label::Real, p_real)
    } else {
        (Label::Fake, p_fake)
    }
}

/// Apply the decision rule and round the confidence
pub fn classify_probabilities(probabilities: [f32; 2]) -> ClassificationResult {
    let (label, confidence) = decide(probabilities);
    ClassificationResult::new(label, confidence)
}

/// Row-wise softmax of a `(batch, 2)` logits tensor
pub fn probabilities(logits: &Tensor) -> Result<Vec<[f32; 2]>> {
    let rows = candle_nn::ops::softmax(logits, D::Minus1)
        .and_then(|p| p.to_dtype(DType::F32))
        .and_then(|p| p.to_vec2::<f32>())
        .map_err(|e| Error::inference(format!("Softmax failed: {}", e)))?;

    rows.into_iter()
        .map(|row| match row.as_slice() {
            [p_fake, p_real] if p_fake.is_finite() && p_real.is_finite() => Ok([*p_fake, *p_real]),
            [_, _] => Err(Error::inference("Model produced non-finite probabilities")),
            other => Err(Error::inference(format!(
                "Expected {} class scores, model produced {}",
                Label::COUNT,
                other.len()
            ))),
        })
        .collect()
}
