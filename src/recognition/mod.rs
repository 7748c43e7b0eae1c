//! Species recognition: the external client contract, its OpenAI-compatible
//! implementation, and the orchestrator that applies results to images and
//! species documents.

pub mod client;
pub mod openai;
pub mod orchestrator;
pub mod retry_policy;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{RecognitionClient, RecognitionError};
pub use openai::{ApiKeySource, OpenAiRecognitionClient};
pub use orchestrator::{
    resolve_image_url, ProcessingError, ProcessingOutcome, RecognitionOrchestrator, Resolution,
};
pub use retry_policy::RetryPolicy;
pub use types::{Enrichment, Identification};
