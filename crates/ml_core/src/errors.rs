//! Error types for the price inference core

use thiserror::Error;

/// Errors that can occur while loading artifacts or serving predictions.
///
/// Data-level irregularities (missing fields, unseen categories, bad dates)
/// never show up here; they are absorbed with documented defaults.
#[derive(Error, Debug)]
pub enum PricingError {
    /// A required artifact (regressor or column list) is absent
    #[error("Required artifact missing: {name}")]
    ArtifactMissing { name: String },

    /// Artifact envelope does not match the expected kind or version
    #[error("Artifact schema mismatch for {artifact}: expected {expected}, found {found}")]
    SchemaMismatch {
        artifact: String,
        expected: String,
        found: String,
    },

    /// Artifact decoded but its content is unusable
    #[error("Invalid artifact {artifact}: {reason}")]
    InvalidArtifact { artifact: String, reason: String },

    /// Artifact fingerprint differs from the configured expectation
    #[error("Artifact hash mismatch for {artifact}: expected {expected}, computed {computed}")]
    HashMismatch {
        artifact: String,
        expected: String,
        computed: String,
    },

    /// Prediction requested before the model context was installed
    #[error("Service unavailable: model context not loaded")]
    ServiceUnavailable,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PricingError {
    /// Whether the surrounding service should report this as unavailable
    /// (as opposed to a bad request or a configuration fault).
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            PricingError::ArtifactMissing { .. }
                | PricingError::SchemaMismatch { .. }
                | PricingError::InvalidArtifact { .. }
                | PricingError::HashMismatch { .. }
                | PricingError::ServiceUnavailable
        )
    }
}

/// Result type for price inference operations
pub type Result<T> = std::result::Result<T, PricingError>;
