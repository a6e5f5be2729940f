//! Model and service configuration

use fakecheck_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Directory name of the model artifact next to the executable
pub const DEFAULT_MODEL_DIR_NAME: &str = "saved_model";

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FakecheckConfig {
    /// Model to load
    #[serde(default)]
    pub model: ModelConfig,

    /// Inference service settings
    #[serde(default)]
    pub service: ServiceConfig,
}

impl FakecheckConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file.
    ///
    /// Relative local model paths are resolved against the file's directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read configuration {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_yaml(&content)?;
        if let (ModelSource::Local { path: model_path }, Some(base)) =
            (&mut config.model.source, path.parent())
        {
            if model_path.is_relative() {
                *model_path = base.join(&*model_path);
            }
        }
        Ok(config)
    }

    /// Load from file if it exists, otherwise use defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.service.validate()
    }
}

/// Configuration for a single model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name reported in logs and metadata
    #[serde(default)]
    pub name: String,

    /// Where the artifact lives
    #[serde(default)]
    pub source: ModelSource,

    /// Device to run on
    #[serde(default)]
    pub device: DeviceSpec,

    /// Maximum sequence length in tokens, special tokens included
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            source: ModelSource::default(),
            device: DeviceSpec::default(),
            max_length: default_max_length(),
        }
    }
}

impl ModelConfig {
    /// Create a configuration for a local artifact directory
    pub fn from_local(path: impl Into<PathBuf>) -> Self {
        Self {
            source: ModelSource::Local { path: path.into() },
            ..Default::default()
        }
    }

    /// Create a configuration for a Hugging Face Hub repository
    pub fn from_hf(repo: impl Into<String>) -> Self {
        Self {
            source: ModelSource::HuggingFace {
                repo: repo.into(),
                revision: default_revision(),
            },
            ..Default::default()
        }
    }

    /// Set device
    pub fn with_device(mut self, device: DeviceSpec) -> Self {
        self.device = device;
        self
    }

    /// Set maximum token length
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Set name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name to report, derived from the source when unset
    pub fn resolved_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        match &self.source {
            ModelSource::Local { path } => path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(DEFAULT_MODEL_DIR_NAME)
                .to_string(),
            ModelSource::HuggingFace { repo, .. } => repo.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::config("model.max_length must be greater than zero"));
        }
        Ok(())
    }
}

/// Model source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSource {
    /// Artifact directory on the local filesystem
    Local {
        #[serde(default = "default_model_dir")]
        path: PathBuf,
    },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Local {
            path: default_model_dir(),
        }
    }
}

/// Device specification, written as `cpu`, `cuda`, `cuda:1`, `metal`, or `mps`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (kind, index) = match lower.split_once(':') {
            Some((kind, index)) => {
                let index = index
                    .parse::<usize>()
                    .map_err(|_| format!("invalid device index in '{}'", s))?;
                (kind, index)
            }
            None => (lower.as_str(), 0),
        };

        match kind {
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda(index)),
            "metal" | "mps" => Ok(Self::Metal(index)),
            _ => Err(format!("unknown device '{}' (expected cpu, cuda, or metal)", s)),
        }
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceSpec> for String {
    fn from(value: DeviceSpec) -> Self {
        value.to_string()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(index) => write!(f, "cuda:{}", index),
            Self::Metal(index) => write!(f, "metal:{}", index),
        }
    }
}

/// Inference service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Wall-clock budget per call, queue wait included
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Requests that may wait for the worker
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::config("service.timeout_ms must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::config(
                "service.queue_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// `saved_model/` next to the running executable
pub fn default_model_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_MODEL_DIR_NAME)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_DIR_NAME))
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_length() -> usize {
    256
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_queue_capacity() -> usize {
    64
}
