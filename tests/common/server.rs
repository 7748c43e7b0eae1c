//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own image ledger and species
//! catalog, backed by SQLite files in a temporary directory.

use super::constants::*;
use species_recognition_server::image_ledger::{Image, ImageLedger, SqliteImageLedger};
use species_recognition_server::recognition::{RecognitionClient, RecognitionOrchestrator};
use species_recognition_server::server::{make_app, RequestsLoggingLevel, ServerConfig, ServerState};
use species_recognition_server::species_catalog::{SpeciesCatalog, SqliteSpeciesCatalog};
use species_recognition_server::worker::QueueWorker;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Test server instance with isolated databases
///
/// When dropped, the worker is stopped, the server gracefully shuts down and
/// temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    #[allow(dead_code)]
    pub port: u16,

    /// Image ledger for direct database access in tests
    pub image_ledger: Arc<SqliteImageLedger>,

    /// Species catalog for direct database access in tests
    #[allow(dead_code)]
    pub species_catalog: Arc<SqliteSpeciesCatalog>,

    /// The worker the server controls
    #[allow(dead_code)]
    pub worker: QueueWorker,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, recognizing through `client`
    ///
    /// The worker is created stopped; tests start it over HTTP when needed.
    ///
    /// # Panics
    ///
    /// Panics if database creation, port binding or server startup fails.
    pub async fn spawn(client: Arc<dyn RecognitionClient>) -> Self {
        let temp_db_dir = TempDir::new().expect("Failed to create temp dir");

        let image_ledger = Arc::new(
            SqliteImageLedger::new(temp_db_dir.path().join("images.db"))
                .expect("Failed to open image ledger"),
        );
        let species_catalog = Arc::new(
            SqliteSpeciesCatalog::new(temp_db_dir.path().join("species.db"))
                .expect("Failed to open species catalog"),
        );

        let orchestrator = Arc::new(RecognitionOrchestrator::new(
            image_ledger.clone(),
            species_catalog.clone(),
            client,
            PUBLIC_BASE_URL,
        ));
        let worker = QueueWorker::new(
            orchestrator,
            Duration::from_millis(WORKER_IDLE_INTERVAL_MS),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
        };
        let state = ServerState::new(
            config,
            image_ledger.clone(),
            species_catalog.clone(),
            worker.clone(),
        );
        let app = make_app(state);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            image_ledger,
            species_catalog,
            worker,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Inserts an image already queued for recognition and returns its id
    pub fn queue_image(&self, path: &str) -> String {
        let image = Image::queued_for_recognition(path);
        self.image_ledger
            .insert(&image)
            .expect("Failed to insert queued image");
        image.id
    }

    /// Inserts a freshly uploaded image, not requested for recognition yet
    #[allow(dead_code)]
    pub fn upload_image(&self, path: &str) -> String {
        let image = Image::new(path);
        self.image_ledger
            .insert(&image)
            .expect("Failed to insert image");
        image.id
    }

    /// Number of documents in the species catalog
    #[allow(dead_code)]
    pub fn species_count(&self) -> usize {
        self.species_catalog
            .count()
            .expect("Failed to count species documents")
    }

    /// Waits until no image is queued or being processed
    ///
    /// # Panics
    ///
    /// Panics if the queue is not drained within `QUEUE_DRAIN_TIMEOUT_MS`.
    #[allow(dead_code)]
    pub async fn wait_for_drained_queue(&self) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(QUEUE_DRAIN_TIMEOUT_MS);

        loop {
            let counts = self
                .image_ledger
                .count_by_status()
                .expect("Failed to count images");
            if counts.queued == 0 && counts.processing == 0 {
                return;
            }
            if start.elapsed() > timeout {
                panic!(
                    "Queue not drained within {}ms: {:?}",
                    QUEUE_DRAIN_TIMEOUT_MS, counts
                );
            }
            tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
        }
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.worker.stop();
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
