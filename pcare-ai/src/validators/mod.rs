//! Validation layer
//!
//! Gatekeepers between raw extractor output and the fusion layer.

pub mod source_validator;

pub use source_validator::{SourceValidator, ValidationResult, ValidationStatus};
