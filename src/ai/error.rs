//! Errors raised by the generation pipeline.

use thiserror::Error;

use crate::ai::Provider;

/// Generation pipeline errors.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// A diff file header could not be understood; the file is skipped.
    #[error("Unrecognised diff header: {0}")]
    ParseFailure(String),

    /// A single chunk failed; recovered locally and reported as a warning.
    #[error("Chunk {index} failed: {reason}")]
    ChunkGenerationFailure {
        /// Zero-based chunk position.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// The final model response could not be read as the expected shape.
    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),

    /// The model backend rejected or failed the request.
    #[error("{provider} request failed: {message}")]
    ProviderError {
        /// Backend that failed.
        provider: Provider,
        /// Message reported by the backend or transport.
        message: String,
    },

    /// Configuration is incomplete or invalid; raised before any request.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl GenerationError {
    /// Builds a [`GenerationError::ProviderError`].
    pub fn provider(provider: Provider, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_carries_message() {
        let err = GenerationError::provider(Provider::Groq, "HTTP 429: slow down");
        assert_eq!(err.to_string(), "groq request failed: HTTP 429: slow down");
    }

    #[test]
    fn anyhow_round_trip_keeps_variant() {
        let err: anyhow::Error = GenerationError::InvalidModelOutput("nope".into()).into();
        assert!(matches!(
            err.downcast_ref::<GenerationError>(),
            Some(GenerationError::InvalidModelOutput(_))
        ));
    }
}
