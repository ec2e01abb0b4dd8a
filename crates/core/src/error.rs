//! Error types for Samarth.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! data-provider failures, input validation, cache and template errors.
//! Provider failures are recovered inside the adapters and never reach the
//! caller; only `InvalidInput` is meant to surface at the request boundary.

use thiserror::Error;

/// Unified error type for Samarth.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The live call did not complete within its bounded timeout
    #[error("Provider '{provider}' timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    /// The provider answered, but the payload could not be normalized
    #[error("Provider '{provider}' returned a malformed response: {message}")]
    ProviderMalformedResponse { provider: String, message: String },

    /// The provider could not be reached or answered with a non-success status
    #[error("Provider '{provider}' unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The provider needs an API key and none is configured
    #[error("Provider '{provider}' unavailable: no API key configured")]
    ProviderMissingCredentials { provider: String },

    /// Empty or unparseable question text
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A pipeline stage produced something that should be impossible
    #[error("Internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// Cache store errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Narrative template errors
    #[error("Template error: {0}")]
    Template(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// True for the provider failure classes the adapters absorb.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            AppError::ProviderTimeout { .. }
                | AppError::ProviderMalformedResponse { .. }
                | AppError::ProviderUnavailable { .. }
                | AppError::ProviderMissingCredentials { .. }
        )
    }

    /// Whether a second live attempt can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ProviderTimeout { .. }
                | AppError::ProviderMalformedResponse { .. }
                | AppError::ProviderUnavailable { .. }
        )
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::ProviderTimeout { .. } => "provider_timeout",
            AppError::ProviderMalformedResponse { .. } => "provider_malformed_response",
            AppError::ProviderUnavailable { .. } => "provider_unavailable",
            AppError::ProviderMissingCredentials { .. } => "provider_missing_credentials",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::InternalInconsistency(_) => "internal_inconsistency",
            AppError::Cache(_) => "cache",
            AppError::Template(_) => "template",
            AppError::Serialization(_) => "serialization",
            AppError::Other(_) => "other",
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
