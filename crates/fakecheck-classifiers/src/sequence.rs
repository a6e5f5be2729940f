//! Sequence-classification backends.
//!
//! Each backend wraps a Candle transformer and its classification head and
//! returns raw logits of shape `(batch, 2)` in `[Fake, Real]` order.

use candle_core::{Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::debertav2::{
    Config as DebertaV2Config, DebertaV2SeqClassificationModel, Id2Label as DebertaId2Label,
};
use candle_transformers::models::xlm_roberta::{
    Config as XlmRobertaConfig, XLMRobertaForSequenceClassification,
};
use fakecheck_core::{Error, Label, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokenizers::Encoding;

/// Backbone plus classification head
pub trait SequenceClassificationModel: Send {
    /// Raw logits of shape `(batch, 2)`
    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor>;

    /// Device the weights live on
    fn device(&self) -> &Device;
}

/// Tokenized inputs as `(batch, seq_len)` u32 tensors
#[derive(Debug, Clone)]
pub struct EncodedBatch {
    pub input_ids: Tensor,
    pub token_type_ids: Tensor,
    pub attention_mask: Tensor,
}

impl EncodedBatch {
    /// Stack equally long encodings.
    ///
    /// The tokenizer pads batches to their longest member, so mismatched
    /// lengths mean padding was not configured.
    pub fn from_encodings(encodings: &[Encoding], device: &Device) -> candle_core::Result<Self> {
        let seq_len = match encodings.first() {
            Some(first) if !first.is_empty() => first.len(),
            _ => return Err(candle_core::Error::Msg("empty encoding batch".to_string())),
        };
        let batch = encodings.len();

        let mut input_ids = Vec::with_capacity(batch * seq_len);
        let mut token_type_ids = Vec::with_capacity(batch * seq_len);
        let mut attention_mask = Vec::with_capacity(batch * seq_len);

        for encoding in encodings {
            if encoding.len() != seq_len {
                return Err(candle_core::Error::Msg(format!(
                    "encoding length {} differs from batch length {}",
                    encoding.len(),
                    seq_len
                )));
            }
            input_ids.extend_from_slice(encoding.get_ids());
            token_type_ids.extend_from_slice(encoding.get_type_ids());
            attention_mask.extend_from_slice(encoding.get_attention_mask());
        }

        Ok(Self {
            input_ids: Tensor::from_vec(input_ids, (batch, seq_len), device)?,
            token_type_ids: Tensor::from_vec(token_type_ids, (batch, seq_len), device)?,
            attention_mask: Tensor::from_vec(attention_mask, (batch, seq_len), device)?,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.dims().first().copied().unwrap_or(0)
    }

    pub fn seq_len(&self) -> usize {
        self.input_ids.dims().get(1).copied().unwrap_or(0)
    }
}

fn parse_config<T: DeserializeOwned>(model_config: &Value) -> Result<T> {
    serde_json::from_value(model_config.clone())
        .map_err(|e| Error::config(format!("Failed to parse model config: {}", e)))
}

fn hidden_size(model_config: &Value) -> Result<usize> {
    model_config
        .get("hidden_size")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| Error::config("Model config has no hidden_size"))
}

fn prefixed(vb: &VarBuilder<'static>, prefix: &str) -> VarBuilder<'static> {
    if prefix.is_empty() {
        vb.clone()
    } else {
        vb.pp(prefix)
    }
}

fn display_prefix(prefix: &str) -> &str {
    if prefix.is_empty() {
        "<root>"
    } else {
        prefix
    }
}

/// DeBERTa-v2/v3 sequence classifier
pub struct DebertaV2Classifier {
    model: DebertaV2SeqClassificationModel,
    device: Device,
}

impl DebertaV2Classifier {
    pub fn load(vb: VarBuilder<'static>, model_config: &Value, device: &Device) -> Result<Self> {
        let config: DebertaV2Config = parse_config(model_config)?;

        // A config that names its labels must not be contradicted
        let id2label: Option<DebertaId2Label> = if model_config.get("id2label").is_some() {
            None
        } else {
            Some(
                Label::ALL
                    .iter()
                    .map(|label| (label.index() as u32, label.to_string()))
                    .collect(),
            )
        };

        let mut errors = Vec::new();
        for prefix in ["deberta", ""] {
            match DebertaV2SeqClassificationModel::load(prefixed(&vb, prefix), &config, id2label.clone()) {
                Ok(model) => {
                    tracing::info!("Loaded DeBERTa backbone from '{}'", display_prefix(prefix));
                    return Ok(Self {
                        model,
                        device: device.clone(),
                    });
                }
                Err(e) => errors.push(format!("{}: {}", display_prefix(prefix), e)),
            }
        }

        Err(Error::config(format!(
            "Failed to load DeBERTa sequence model with tried prefixes [{}]",
            errors.join(" | ")
        )))
    }
}

impl SequenceClassificationModel for DebertaV2Classifier {
    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        self.model.forward(
            &batch.input_ids,
            Some(batch.token_type_ids.clone()),
            Some(batch.attention_mask.clone()),
        )
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// BERT sequence classifier: `[CLS]` -> pooler (dense + tanh) -> linear head
pub struct BertClassifier {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    device: Device,
}

impl BertClassifier {
    pub fn load(vb: VarBuilder<'static>, model_config: &Value, device: &Device) -> Result<Self> {
        let config: BertConfig = parse_config(model_config)?;
        let hidden = hidden_size(model_config)?;

        let mut errors = Vec::new();
        for prefix in ["bert", ""] {
            let vb_prefix = prefixed(&vb, prefix);
            let loaded = BertModel::load(vb_prefix.clone(), &config).and_then(|model| {
                let pooler = candle_nn::linear(hidden, hidden, vb_prefix.pp("pooler").pp("dense"))?;
                Ok((model, pooler))
            });

            match loaded {
                Ok((model, pooler)) => {
                    let classifier = candle_nn::linear(hidden, Label::COUNT, vb.pp("classifier"))
                        .map_err(|e| {
                            Error::config(format!("Failed to load classification head: {}", e))
                        })?;
                    tracing::info!("Loaded BERT backbone from '{}'", display_prefix(prefix));
                    return Ok(Self {
                        model,
                        pooler,
                        classifier,
                        device: device.clone(),
                    });
                }
                Err(e) => errors.push(format!("{}: {}", display_prefix(prefix), e)),
            }
        }

        Err(Error::config(format!(
            "Failed to load BERT backbone with tried prefixes [{}]",
            errors.join(" | ")
        )))
    }
}

impl SequenceClassificationModel for BertClassifier {
    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        let hidden_states = self.model.forward(
            &batch.input_ids,
            &batch.token_type_ids,
            Some(&batch.attention_mask),
        )?;
        let cls = hidden_states.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        self.classifier.forward(&pooled)
    }

    fn device(&self) -> &Device {
        &self.device
    }
}

/// RoBERTa / XLM-RoBERTa sequence classifier
pub struct RobertaClassifier {
    model: XLMRobertaForSequenceClassification,
    device: Device,
}

impl RobertaClassifier {
    pub fn load(vb: VarBuilder<'static>, model_config: &Value, device: &Device) -> Result<Self> {
        let config: XlmRobertaConfig = parse_config(model_config)?;

        let mut errors = Vec::new();
        for prefix in ["", "model"] {
            match XLMRobertaForSequenceClassification::new(Label::COUNT, &config, prefixed(&vb, prefix)) {
                Ok(model) => {
                    tracing::info!("Loaded RoBERTa backbone from '{}'", display_prefix(prefix));
                    return Ok(Self {
                        model,
                        device: device.clone(),
                    });
                }
                Err(e) => errors.push(format!("{}: {}", display_prefix(prefix), e)),
            }
        }

        Err(Error::config(format!(
            "Failed to load RoBERTa sequence model with tried prefixes [{}]",
            errors.join(" | ")
        )))
    }
}

impl SequenceClassificationModel for RobertaClassifier {
    fn forward(&self, batch: &EncodedBatch) -> candle_core::Result<Tensor> {
        self.model.forward(
            &batch.input_ids,
            &batch.attention_mask,
            &batch.token_type_ids,
        )
    }

    fn device(&self) -> &Device {
        &self.device
    }
}
