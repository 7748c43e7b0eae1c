//! Test doubles for the recognition service
//!
//! `FakeRecognitionClient` stands in for the whole recognition capability and
//! is what most end-to-end tests plug into the server. `FakeCompletionsApi`
//! is a tiny chat-completions endpoint used to exercise the real HTTP client.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use species_recognition_server::recognition::{
    Enrichment, Identification, RecognitionClient, RecognitionError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

// ============================================================================
// Fake recognition client
// ============================================================================

/// Recognition client answering from scripts keyed by full image URL.
///
/// Unscripted images fail with a connection error. Every species gets a
/// generic enrichment unless an enrich failure was scripted for it.
#[derive(Default)]
pub struct FakeRecognitionClient {
    identifications: Mutex<HashMap<String, Identification>>,
    failing_enrichments: Mutex<Vec<String>>,
    identify_calls: AtomicUsize,
    enrich_calls: AtomicUsize,
}

impl FakeRecognitionClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn identify_as(&self, image_url: &str, scientific: &str, common: &str, confidence: f64) {
        self.identifications.lock().unwrap().insert(
            image_url.to_string(),
            Identification {
                scientific_name: scientific.to_string(),
                common_name: Some(common.to_string()),
                confidence,
            },
        );
    }

    pub fn fail_enrichment_of(&self, scientific: &str) {
        self.failing_enrichments
            .lock()
            .unwrap()
            .push(scientific.to_lowercase());
    }

    pub fn identify_calls(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }

    pub fn enrich_calls(&self) -> usize {
        self.enrich_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecognitionClient for FakeRecognitionClient {
    async fn identify(&self, image_url: &str) -> Result<Identification, RecognitionError> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        self.identifications
            .lock()
            .unwrap()
            .get(image_url)
            .cloned()
            .ok_or_else(|| RecognitionError::Connection(format!("no script for {}", image_url)))
    }

    async fn enrich(
        &self,
        scientific_name: &str,
        _common_name: Option<&str>,
    ) -> Result<Enrichment, RecognitionError> {
        self.enrich_calls.fetch_add(1, Ordering::SeqCst);
        let key = scientific_name.to_lowercase();
        if self.failing_enrichments.lock().unwrap().contains(&key) {
            return Err(RecognitionError::Api {
                status: 400,
                message: "enrichment refused".to_string(),
            });
        }
        Ok(Enrichment {
            family: Some(format!("{} family", scientific_name)),
            kingdom: Some("Testae".to_string()),
            fun_facts: vec![format!("{} is scripted", scientific_name)],
            raw_response: "{}".to_string(),
            ..Default::default()
        })
    }
}

// ============================================================================
// Fake chat-completions endpoint
// ============================================================================

/// One scripted reply of the fake completions endpoint.
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 200 with this string as the assistant message content.
    Content(String),
    /// A bare error status.
    Status(u16),
}

/// A request received by the fake completions endpoint.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
struct FakeApiState {
    replies: Mutex<VecDeque<FakeReply>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Chat-completions server answering with scripted replies in order.
///
/// When the script runs out every request gets a 500.
pub struct FakeCompletionsApi {
    /// API root to hand to the client, e.g. "http://127.0.0.1:12345/v1"
    pub base_url: String,
    state: Arc<FakeApiState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeCompletionsApi {
    pub async fn spawn(replies: Vec<FakeReply>) -> Self {
        let state = Arc::new(FakeApiState {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(vec![]),
        });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake completions API");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let app = Router::new()
            .route("/v1/chat/completions", post(chat_completions))
            .with_state(state.clone());

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake completions API failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}/v1", port),
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeCompletionsApi {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn chat_completions(
    State(state): State<Arc<FakeApiState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string()),
        body,
    });

    let reply = state.replies.lock().unwrap().pop_front();
    match reply {
        Some(FakeReply::Content(content)) => Json(json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        }))
        .into_response(),
        Some(FakeReply::Status(status)) => (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "scripted failure",
        )
            .into_response(),
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no scripted reply left").into_response(),
    }
}
