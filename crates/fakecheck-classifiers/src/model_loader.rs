//! Model artifact loading for Candle-based classifiers
//!
//! An artifact directory holds what `save_pretrained` writes: `config.json`,
//! `tokenizer.json` (or a BERT `vocab.txt`), and `model.safetensors`. Every
//! failure here happens before the classifier can serve, so all errors are
//! configuration errors.

use crate::model_config::{DeviceSpec, ModelConfig, ModelSource};
use crate::sequence::{BertClassifier, DebertaV2Classifier, RobertaClassifier, SequenceClassificationModel};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use fakecheck_core::{Error, Label, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const VOCAB_FILE: &str = "vocab.txt";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Model architecture, detected from `config.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    /// DeBERTa-v2/v3 with context pooler and linear head
    DebertaV2,
    /// BERT with pooler and linear head
    Bert,
    /// RoBERTa / XLM-RoBERTa with dense + projection head
    Roberta,
}

impl Architecture {
    /// Detect from the parsed `config.json`.
    ///
    /// `model_type` wins; `architectures` is the fallback for configs
    /// written by older tooling.
    pub fn detect(config: &Value) -> Result<Self> {
        if let Some(model_type) = config.get("model_type").and_then(Value::as_str) {
            return Self::from_model_type(model_type);
        }

        let architectures = config
            .get("architectures")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect::<Vec<_>>())
            .unwrap_or_default();

        for name in &architectures {
            let lower = name.to_ascii_lowercase();
            if lower.starts_with("debertav2") || lower.starts_with("deberta") {
                return Ok(Self::DebertaV2);
            }
            if lower.starts_with("xlmroberta") || lower.starts_with("roberta") {
                return Ok(Self::Roberta);
            }
            if lower.starts_with("bert") {
                return Ok(Self::Bert);
            }
        }

        Err(Error::config(format!(
            "Cannot determine model architecture (model_type missing, architectures {:?})",
            architectures
        )))
    }

    fn from_model_type(model_type: &str) -> Result<Self> {
        match model_type {
            "deberta-v2" => Ok(Self::DebertaV2),
            "bert" => Ok(Self::Bert),
            "roberta" | "xlm-roberta" => Ok(Self::Roberta),
            other => Err(Error::config(format!(
                "Unsupported model_type '{}' (supported: deberta-v2, bert, roberta, xlm-roberta)",
                other
            ))),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DebertaV2 => "deberta-v2",
            Self::Bert => "bert",
            Self::Roberta => "roberta",
        })
    }
}

/// Everything needed to build a [`crate::TextClassifier`]
pub struct LoadedModel {
    pub name: String,
    pub architecture: Architecture,
    pub tokenizer: Tokenizer,
    pub model: Box<dyn SequenceClassificationModel>,
}

/// Load tokenizer and weights for the configured model
pub fn load_model(config: &ModelConfig) -> Result<LoadedModel> {
    config.validate()?;

    let model_dir = resolve_model_dir(&config.source)?;
    let name = config.resolved_name();
    tracing::info!("Loading model '{}' from {}", name, model_dir.display());

    let model_config = read_model_config(&model_dir)?;
    let architecture = Architecture::detect(&model_config)?;
    check_num_labels(&model_config)?;
    check_max_length(architecture, &model_config, config.max_length)?;

    let tokenizer = load_tokenizer(&model_dir)?;
    let device = create_device(config.device)?;
    let vb = load_var_builder(&model_dir, &device)?;

    let model: Box<dyn SequenceClassificationModel> = match architecture {
        Architecture::DebertaV2 => Box::new(DebertaV2Classifier::load(vb, &model_config, &device)?),
        Architecture::Bert => Box::new(BertClassifier::load(vb, &model_config, &device)?),
        Architecture::Roberta => Box::new(RobertaClassifier::load(vb, &model_config, &device)?),
    };

    tracing::info!(
        "Loaded {} classifier '{}' on {}",
        architecture,
        name,
        config.device
    );

    Ok(LoadedModel {
        name,
        architecture,
        tokenizer,
        model,
    })
}

/// Resolve the artifact directory, downloading from the Hub if configured
pub fn resolve_model_dir(source: &ModelSource) -> Result<PathBuf> {
    match source {
        ModelSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::config(format!(
                    "Could not find model directory at {}",
                    path.display()
                )));
            }
            Ok(path.clone())
        }
        ModelSource::HuggingFace { repo, revision } => download_from_huggingface(repo, revision),
    }
}

fn download_from_huggingface(repo: &str, revision: &str) -> Result<PathBuf> {
    tracing::info!("Downloading model from HuggingFace: {} @ {}", repo, revision);

    let api = Api::new()
        .map_err(|e| Error::config(format!("Failed to initialize HuggingFace API: {}", e)))?;
    let repo_obj = api.repo(Repo::with_revision(
        repo.to_string(),
        RepoType::Model,
        revision.to_string(),
    ));

    let config_path = repo_obj
        .get(CONFIG_FILE)
        .map_err(|e| Error::config(format!("Failed to download {}: {}", CONFIG_FILE, e)))?;

    for file in [TOKENIZER_FILE, WEIGHTS_FILE] {
        tracing::debug!("Downloading {}", file);
        repo_obj
            .get(file)
            .map_err(|e| Error::config(format!("Failed to download {}: {}", file, e)))?;
    }

    let model_dir = config_path
        .parent()
        .ok_or_else(|| Error::config("Invalid HuggingFace cache path"))?;

    tracing::info!("Model available at: {}", model_dir.display());
    Ok(model_dir.to_path_buf())
}

/// Read and parse `config.json`
pub fn read_model_config(model_dir: &Path) -> Result<Value> {
    let path = model_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::config(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Number of classes the checkpoint was trained with.
///
/// `id2label` is what `save_pretrained` always writes; `num_labels` is
/// accepted for hand-written configs.
pub fn num_labels(model_config: &Value) -> usize {
    model_config
        .get("id2label")
        .and_then(Value::as_object)
        .map(|m| m.len())
        .or_else(|| {
            model_config
                .get("num_labels")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
        })
        .unwrap_or(Label::COUNT)
}

fn check_num_labels(model_config: &Value) -> Result<()> {
    let n = num_labels(model_config);
    if n != Label::COUNT {
        return Err(Error::config(format!(
            "Model has {} labels, a binary Fake/Real head is required",
            n
        )));
    }
    Ok(())
}

/// Longest token sequence the checkpoint's position embeddings cover.
///
/// `None` when `config.json` does not say.
pub fn max_positions(architecture: Architecture, model_config: &Value) -> Option<usize> {
    let positions = model_config
        .get("max_position_embeddings")
        .and_then(Value::as_u64)? as usize;

    match architecture {
        Architecture::Bert | Architecture::DebertaV2 => Some(positions),
        // Position ids start after the padding index
        Architecture::Roberta => {
            let pad = model_config
                .get("pad_token_id")
                .and_then(Value::as_u64)
                .unwrap_or(1) as usize;
            Some(positions.saturating_sub(pad + 1))
        }
    }
}

fn check_max_length(architecture: Architecture, model_config: &Value, max_length: usize) -> Result<()> {
    match max_positions(architecture, model_config) {
        Some(limit) if max_length > limit => Err(Error::config(format!(
            "max_length {} exceeds the {} positions supported by this {} checkpoint",
            max_length, limit, architecture
        ))),
        _ => Ok(()),
    }
}

/// Create Candle device from the configured spec
pub fn create_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda(idx) => Device::new_cuda(idx)
            .map_err(|e| Error::config(format!("Failed to create CUDA device: {}", e))),
        DeviceSpec::Metal(idx) => Device::new_metal(idx)
            .map_err(|e| Error::config(format!("Failed to create Metal device: {}", e))),
    }
}

/// Load the tokenizer, preferring `tokenizer.json` over a bare `vocab.txt`
pub fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join(TOKENIZER_FILE);
    if tokenizer_path.exists() {
        tracing::debug!("Loading tokenizer from {}", TOKENIZER_FILE);
        return Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::config(format!("Failed to load {}: {}", TOKENIZER_FILE, e)));
    }

    let vocab_path = model_dir.join(VOCAB_FILE);
    if vocab_path.exists() {
        tracing::debug!("Building WordPiece tokenizer from {}", VOCAB_FILE);

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(vocab_path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::config(format!("Failed to build WordPiece model: {}", e)))?;

        let cls_id = wordpiece_token_id(&wordpiece, "[CLS]")?;
        let sep_id = wordpiece_token_id(&wordpiece, "[SEP]")?;

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
        tokenizer.with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), sep_id),
            ("[CLS]".to_string(), cls_id),
        )));

        return Ok(tokenizer);
    }

    Err(Error::config(format!(
        "No tokenizer found in {} (tried {}, {})",
        model_dir.display(),
        TOKENIZER_FILE,
        VOCAB_FILE
    )))
}

fn wordpiece_token_id(model: &tokenizers::models::wordpiece::WordPiece, token: &str) -> Result<u32> {
    use tokenizers::Model;

    model
        .token_to_id(token)
        .ok_or_else(|| Error::config(format!("{} is missing {}", VOCAB_FILE, token)))
}

/// Truncate to `max_length` tokens and pad batches to their longest member.
///
/// A padding setup already present in the tokenizer keeps its pad token but
/// switches to batch-longest, so single requests are never padded.
pub fn configure_tokenizer(tokenizer: &mut Tokenizer, max_length: usize) -> Result<()> {
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| Error::config(format!("Failed to configure truncation: {}", e)))?;

    let padding = match tokenizer.get_padding() {
        Some(existing) => PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..existing.clone()
        },
        None => {
            let (pad_id, pad_token) = find_pad_token(tokenizer);
            PaddingParams {
                strategy: PaddingStrategy::BatchLongest,
                pad_id,
                pad_token,
                ..Default::default()
            }
        }
    };
    tokenizer.with_padding(Some(padding));

    Ok(())
}

fn find_pad_token(tokenizer: &Tokenizer) -> (u32, String) {
    for candidate in ["[PAD]", "<pad>"] {
        if let Some(id) = tokenizer.token_to_id(candidate) {
            return (id, candidate.to_string());
        }
    }
    let fallback = tokenizer.id_to_token(0).unwrap_or_else(|| "[PAD]".to_string());
    (0, fallback)
}

/// Memory-map `model.safetensors`
pub fn load_var_builder(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let weights_path = model_dir.join(WEIGHTS_FILE);
    if !weights_path.exists() {
        return Err(Error::config(format!(
            "{} not found in {}",
            WEIGHTS_FILE,
            model_dir.display()
        )));
    }

    // SAFETY: the weights file is not modified while the model is loaded
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)
            .map_err(|e| Error::config(format!("Failed to load weights: {}", e)))?
    };

    Ok(vb)
}
