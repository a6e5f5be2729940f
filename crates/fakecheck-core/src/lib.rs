//! fakecheck Core
//!
//! Types shared by every fakecheck component.
//!
//! This crate provides:
//! - The error taxonomy (configuration, invalid input, inference)
//! - The classification data model (`Label`, `ClassificationResult`, `DatasetVerdict`)
//! - Rendering of results in the mapping shape callers parse, and a parser for it

pub mod error;
pub mod output;
pub mod types;

pub use error::{Error, ErrorKind, Result};
pub use output::{parse_mapping, OutputFormat};
pub use types::{
    ClassificationMetadata, ClassificationRequest, ClassificationResult, DatasetVerdict, Label,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::types::{ClassificationRequest, ClassificationResult, DatasetVerdict, Label};
}
