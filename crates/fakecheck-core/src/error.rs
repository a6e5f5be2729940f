//! Error types for fakecheck

use std::time::Duration;

/// Result type alias using fakecheck's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for fakecheck operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model artifact or settings missing/unreadable
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected before any tokenizer or model work
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Tokenization or forward-pass failure
    #[error("inference error: {0}")]
    Inference(String),

    /// Inference did not finish within the per-call budget
    #[error("inference timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// The inference worker is gone
    #[error("inference service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Classifier output that does not hold a `{label, confidence}` mapping
    #[error("malformed classifier output: {0}")]
    MalformedOutput(String),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error category, used for propagation policy and exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal: the process cannot serve
    Configuration,
    /// Recoverable: the request was rejected up front
    InvalidInput,
    /// Recoverable per request
    Inference,
}

impl ErrorKind {
    /// Short name used as a metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::InvalidInput => "invalid_input",
            Self::Inference => "inference",
        }
    }
}

impl Error {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new malformed output error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedOutput(msg.into())
    }

    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Io(_) | Self::Serialization(_) => ErrorKind::Configuration,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Inference(_)
            | Self::Timeout(_)
            | Self::ServiceUnavailable(_)
            | Self::MalformedOutput(_) => ErrorKind::Inference,
        }
    }

    /// Whether the process can keep serving after this error
    pub fn is_recoverable(&self) -> bool {
        self.kind() != ErrorKind::Configuration
    }

    /// Whether a caller may retry the same request.
    ///
    /// Inference is deterministic, so only errors caused by resource pressure
    /// on the worker are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::ServiceUnavailable(_))
    }
}
