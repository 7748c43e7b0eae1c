//! Recognition client trait definition.

use super::types::{Enrichment, Identification};
use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a recognition client.
///
/// Transport errors are retried inside the client where it makes sense; by the
/// time one of these reaches a caller, the client has given up.
#[derive(Debug, Clone, Error)]
pub enum RecognitionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Rate limited")]
    RateLimited,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The completion envelope itself could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The model answered, but not with the JSON object we asked for.
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

impl RecognitionError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            RecognitionError::Connection(_)
            | RecognitionError::Timeout
            | RecognitionError::RateLimited => true,
            RecognitionError::Api { status, .. } => *status >= 500,
            RecognitionError::InvalidResponse(_) | RecognitionError::Protocol(_) => false,
        }
    }

    /// Short label used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RecognitionError::Connection(_) => "connection",
            RecognitionError::Timeout => "timeout",
            RecognitionError::RateLimited => "rate_limited",
            RecognitionError::Api { .. } => "api",
            RecognitionError::InvalidResponse(_) => "invalid_response",
            RecognitionError::Protocol(_) => "protocol",
        }
    }
}

/// The external species-recognition capability.
///
/// Both calls are plain request/response with no local state.
#[async_trait]
pub trait RecognitionClient: Send + Sync {
    /// Identify the species shown in the image at `image_url`.
    async fn identify(&self, image_url: &str) -> Result<Identification, RecognitionError>;

    /// Produce reference data for a species.
    async fn enrich(
        &self,
        scientific_name: &str,
        common_name: Option<&str>,
    ) -> Result<Enrichment, RecognitionError>;
}
