//! Results of the two recognition calls and the strict JSON payloads they are
//! parsed from.

use super::client::RecognitionError;
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Confidence used when the model gives none, or gives something unusable.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Outcome of an Identify call.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Trimmed, never empty.
    pub scientific_name: String,
    pub common_name: Option<String>,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f64,
}

/// Outcome of an Enrich call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub family: Option<String>,
    pub kingdom: Option<String>,
    pub species_type: Option<String>,
    pub habitat: Option<String>,
    pub conservation: Option<String>,
    pub reference_image_url: Option<String>,
    pub fun_facts: Vec<String>,
    pub facts: Vec<String>,
    /// The model's message content, verbatim.
    pub raw_response: String,
}

#[derive(Debug, Deserialize)]
struct IdentifyPayload {
    scientific: String,
    #[serde(default)]
    common: Option<String>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnrichPayload {
    #[serde(default)]
    family: Option<String>,
    #[serde(default)]
    kingdom: Option<String>,
    #[serde(default)]
    species_type: Option<String>,
    #[serde(default)]
    habitat: Option<String>,
    #[serde(default)]
    conservation: Option<String>,
    #[serde(default)]
    reference_image_url: Option<String>,
    /// Older name of `referenceImageUrl`, used only when that one is absent.
    #[serde(default)]
    stock_image_url: Option<String>,
    #[serde(default)]
    fun_facts: Option<Vec<String>>,
    #[serde(default)]
    facts: Option<Vec<String>>,
}

/// Parses message content that must be exactly one JSON object.
fn parse_json_object<T: DeserializeOwned>(content: &str) -> Result<T, RecognitionError> {
    let value: serde_json::Value = serde_json::from_str(content.trim())
        .map_err(|e| RecognitionError::Protocol(format!("content is not a JSON document: {}", e)))?;
    if !value.is_object() {
        return Err(RecognitionError::Protocol(
            "content is not a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| RecognitionError::Protocol(format!("unexpected payload shape: {}", e)))
}

fn normalize_confidence(value: Option<&serde_json::Value>) -> f64 {
    match value.and_then(|v| v.as_f64()) {
        Some(c) if c.is_finite() && (0.0..=1.0).contains(&c) => c,
        _ => DEFAULT_CONFIDENCE,
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Identification {
    pub fn from_content(content: &str) -> Result<Self, RecognitionError> {
        let payload: IdentifyPayload = parse_json_object(content)?;
        let scientific_name = payload.scientific.trim().to_string();
        if scientific_name.is_empty() {
            return Err(RecognitionError::Protocol(
                "empty scientific name".to_string(),
            ));
        }
        Ok(Identification {
            scientific_name,
            common_name: non_empty(payload.common),
            confidence: normalize_confidence(payload.confidence.as_ref()),
        })
    }
}

impl Enrichment {
    pub fn from_content(content: &str) -> Result<Self, RecognitionError> {
        let payload: EnrichPayload = parse_json_object(content)?;
        Ok(Enrichment {
            family: payload.family,
            kingdom: payload.kingdom,
            species_type: payload.species_type,
            habitat: payload.habitat,
            conservation: payload.conservation,
            reference_image_url: payload.reference_image_url.or(payload.stock_image_url),
            fun_facts: payload.fun_facts.unwrap_or_default(),
            facts: payload.facts.unwrap_or_default(),
            raw_response: content.to_string(),
        })
    }
}
