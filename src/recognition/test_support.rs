use super::client::{RecognitionClient, RecognitionError};
use super::types::{Enrichment, Identification};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Recognition client answering from per-URL and per-species scripts.
///
/// Unscripted URLs fail with a connection error; unscripted species get a
/// generic enrichment.
pub struct ScriptedRecognitionClient {
    identify: Mutex<HashMap<String, Result<Identification, RecognitionError>>>,
    enrich: Mutex<HashMap<String, Result<Enrichment, RecognitionError>>>,
    identify_calls: AtomicUsize,
    enrich_calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedRecognitionClient {
    pub fn new() -> Self {
        Self {
            identify: Mutex::new(HashMap::new()),
            enrich: Mutex::new(HashMap::new()),
            identify_calls: AtomicUsize::new(0),
            enrich_calls: Mutex::new(vec![]),
            delay: Mutex::new(None),
        }
    }

    pub fn script_identify(&self, url: &str, scientific_name: &str, confidence: f64) {
        self.identify.lock().unwrap().insert(
            url.to_string(),
            Ok(Identification {
                scientific_name: scientific_name.to_string(),
                common_name: Some(format!("common {}", scientific_name)),
                confidence,
            }),
        );
    }

    pub fn script_identify_error(&self, url: &str, error: RecognitionError) {
        self.identify
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
    }

    pub fn script_enrich_error(&self, scientific_name: &str, error: RecognitionError) {
        self.enrich
            .lock()
            .unwrap()
            .insert(scientific_name.to_lowercase(), Err(error));
    }

    /// Make every identify call take `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn identify_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }

    pub fn enrich_calls(&self) -> Vec<String> {
        self.enrich_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecognitionClient for ScriptedRecognitionClient {
    async fn identify(&self, image_url: &str) -> Result<Identification, RecognitionError> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.identify
            .lock()
            .unwrap()
            .get(image_url)
            .cloned()
            .unwrap_or_else(|| {
                Err(RecognitionError::Connection(format!(
                    "no script for {}",
                    image_url
                )))
            })
    }

    async fn enrich(
        &self,
        scientific_name: &str,
        _common_name: Option<&str>,
    ) -> Result<Enrichment, RecognitionError> {
        self.enrich_calls
            .lock()
            .unwrap()
            .push(scientific_name.to_string());
        self.enrich
            .lock()
            .unwrap()
            .get(&scientific_name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| {
                Ok(Enrichment {
                    family: Some("Testidae".to_string()),
                    kingdom: Some("Animalia".to_string()),
                    facts: vec![format!("{} exists", scientific_name)],
                    raw_response: "{\"family\":\"Testidae\"}".to_string(),
                    ..Enrichment::default()
                })
            })
    }
}
