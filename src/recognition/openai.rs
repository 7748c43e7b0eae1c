//! Recognition client for OpenAI-compatible chat completion APIs.
//!
//! Works with OpenAI, OpenRouter, vLLM and any other service implementing
//! `POST /chat/completions` with vision input.

use super::client::{RecognitionClient, RecognitionError};
use super::retry_policy::RetryPolicy;
use super::types::{Enrichment, Identification};
use crate::config::RecognitionSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Timeout for api_key_command execution.
const API_KEY_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const IDENTIFY_MAX_TOKENS: u32 = 300;
const ENRICH_MAX_TOKENS: u32 = 1000;

const IDENTIFY_PROMPT: &str = r#"Identify the species in this image.
Reply with a single JSON object and nothing else (no markdown, no code fences), using exactly these keys:
{"scientific": "<scientific name>", "common": "<common name or null>", "confidence": <number between 0 and 1>}
If you are unsure, give your best guess and lower the confidence."#;

/// Source of API key for authentication.
#[derive(Debug, Clone)]
pub enum ApiKeySource {
    None,
    Static(String),
    /// Shell command that prints the key, run before every request.
    Command(String),
}

impl ApiKeySource {
    /// Picks the key source from settings: an explicit key wins over a command.
    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        match (&settings.api_key, &settings.api_key_command) {
            (Some(key), _) if !key.is_empty() => ApiKeySource::Static(key.clone()),
            (_, Some(cmd)) if !cmd.is_empty() => ApiKeySource::Command(cmd.clone()),
            _ => ApiKeySource::None,
        }
    }

    async fn get_key(&self) -> Result<Option<String>, RecognitionError> {
        match self {
            ApiKeySource::None => Ok(None),
            ApiKeySource::Static(key) => Ok(Some(key.clone())),
            ApiKeySource::Command(cmd) => {
                debug!(command = %cmd, "Fetching API key via command");

                let output = match tokio::time::timeout(
                    API_KEY_COMMAND_TIMEOUT,
                    Command::new("sh").arg("-c").arg(cmd).output(),
                )
                .await
                {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        warn!(command = %cmd, error = %e, "api_key_command failed to execute");
                        return Err(RecognitionError::Connection(format!(
                            "Failed to execute api_key_command: {}",
                            e
                        )));
                    }
                    Err(_) => {
                        warn!(command = %cmd, "api_key_command timed out");
                        return Err(RecognitionError::Timeout);
                    }
                };

                if !output.status.success() {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    warn!(command = %cmd, stderr = %stderr, "api_key_command failed");
                    return Err(RecognitionError::Connection(format!(
                        "api_key_command failed with status {}: {}",
                        output.status, stderr
                    )));
                }

                let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if key.is_empty() {
                    return Err(RecognitionError::Connection(
                        "api_key_command returned empty key".to_string(),
                    ));
                }
                Ok(Some(key))
            }
        }
    }
}

pub struct OpenAiRecognitionClient {
    client: Client,
    base_url: String,
    model: String,
    api_key_source: ApiKeySource,
    request_timeout: Duration,
    retry_policy: RetryPolicy,
}

impl OpenAiRecognitionClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key_source: ApiKeySource,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key_source,
            request_timeout: Duration::from_secs(60),
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        Self::new(
            settings.api_url.clone(),
            settings.model.clone(),
            ApiKeySource::from_settings(settings),
        )
        .with_request_timeout(Duration::from_secs(settings.request_timeout_secs))
        .with_retry_policy(RetryPolicy::new(settings))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn enrich_prompt(scientific_name: &str, common_name: Option<&str>) -> String {
        let subject = match common_name {
            Some(common) => format!("{} ({})", scientific_name, common),
            None => scientific_name.to_string(),
        };
        format!(
            r#"Provide reference information about the species {}.
Reply with a single JSON object and nothing else (no markdown, no code fences), using exactly these keys:
{{
  "family": "taxonomic family",
  "kingdom": "biological kingdom (Plantae, Animalia, Fungi, ...)",
  "speciesType": "general type (plant, bird, mammal, insect, fungus, ...)",
  "funFacts": ["interesting fact", "..."],
  "facts": ["general fact", "..."],
  "habitat": "natural habitat and distribution",
  "conservation": "conservation status if known",
  "referenceImageUrl": "a public URL of a representative photo (Wikimedia Commons, iNaturalist or similar)"
}}
Use null for anything you do not know."#,
            subject
        )
    }

    /// Runs one chat completion, retrying transport failures per the retry
    /// policy, and returns the message content.
    async fn complete(
        &self,
        call: &'static str,
        request: &ChatRequest,
    ) -> Result<String, RecognitionError> {
        let mut retry_count = 0;
        loop {
            match self.complete_once(request).await {
                Ok(content) => return Ok(content),
                Err(e) if self.retry_policy.should_retry(&e, retry_count) => {
                    let backoff = self.retry_policy.backoff(retry_count);
                    warn!(
                        call,
                        error = %e,
                        retry = retry_count + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        "Recognition request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    retry_count += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn complete_once(&self, request: &ChatRequest) -> Result<String, RecognitionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut req_builder = self.client.post(&url).json(request);

        if let Some(api_key) = self.api_key_source.get_key().await? {
            req_builder = req_builder.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req_builder
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RecognitionError::Timeout
                } else {
                    RecognitionError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(RecognitionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RecognitionError::Timeout
            } else {
                RecognitionError::InvalidResponse(format!("Failed to parse response: {}", e))
            }
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RecognitionError::InvalidResponse("No choices in response".to_string()))?;

        debug!(
            finish_reason = ?choice.finish_reason,
            "Received completion from recognition API"
        );

        choice
            .message
            .content
            .ok_or_else(|| RecognitionError::InvalidResponse("Empty message content".to_string()))
    }
}

#[async_trait]
impl RecognitionClient for OpenAiRecognitionClient {
    async fn identify(&self, image_url: &str) -> Result<Identification, RecognitionError> {
        debug!(model = %self.model, image_url, "Sending identify request");
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: IDENTIFY_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image_url.to_string(),
                        },
                    },
                ]),
            }],
            max_tokens: IDENTIFY_MAX_TOKENS,
        };
        let content = self.complete("identify", &request).await?;
        Identification::from_content(&content)
    }

    async fn enrich(
        &self,
        scientific_name: &str,
        common_name: Option<&str>,
    ) -> Result<Enrichment, RecognitionError> {
        debug!(model = %self.model, scientific_name, "Sending enrich request");
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Text(Self::enrich_prompt(scientific_name, common_name)),
            }],
            max_tokens: ENRICH_MAX_TOKENS,
        };
        let content = self.complete("enrich", &request).await?;
        Enrichment::from_content(&content)
    }
}

// ============================================================================
// OpenAI API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}
