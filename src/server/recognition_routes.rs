//! Recognition HTTP routes.
//!
//! Provides endpoints for:
//! - Worker control (status, start, stop, manual single step)
//! - Requesting recognition of an image
//! - Reading images and species documents back

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::image_ledger::{ImageStatusCounts, QueueRequestResult};
use crate::recognition::ProcessingOutcome;
use crate::server::state::{GuardedImageLedger, GuardedSpeciesCatalog, ServerState};
use crate::worker::{QueueWorker, WorkerStatus};

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionStatusResponse {
    #[serde(flatten)]
    pub worker: WorkerStatus,
    /// Missing if the ledger could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageStatusCounts>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerControlResponse {
    /// False when the request was a no-op (already running / not running).
    pub changed: bool,
    pub status: WorkerStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOneResponse {
    /// False when no eligible image was found.
    pub processed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ProcessingOutcome>,
}

// =============================================================================
// Worker control
// =============================================================================

async fn get_status(
    State(worker): State<QueueWorker>,
    State(ledger): State<GuardedImageLedger>,
) -> impl IntoResponse {
    let images = match ledger.count_by_status() {
        Ok(counts) => Some(counts),
        Err(err) => {
            warn!("Failed to count images by status: {:#}", err);
            None
        }
    };
    Json(RecognitionStatusResponse {
        worker: worker.status(),
        images,
    })
}

async fn start_worker(State(worker): State<QueueWorker>) -> impl IntoResponse {
    let changed = worker.start();
    if changed {
        info!("Recognition worker started via HTTP");
    }
    Json(WorkerControlResponse {
        changed,
        status: worker.status(),
    })
}

async fn stop_worker(State(worker): State<QueueWorker>) -> impl IntoResponse {
    let changed = worker.stop();
    Json(WorkerControlResponse {
        changed,
        status: worker.status(),
    })
}

async fn process_one(State(worker): State<QueueWorker>) -> impl IntoResponse {
    match worker.process_one().await {
        Ok(outcome) => Json(ProcessOneResponse {
            processed: outcome.is_some(),
            outcome,
        })
        .into_response(),
        Err(err) => {
            warn!("Manual recognition step failed: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to process next image: {}", err),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Images and species
// =============================================================================

async fn request_recognition(
    State(ledger): State<GuardedImageLedger>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ledger.queue_for_recognition(&id) {
        Ok(QueueRequestResult::NotFound) => (StatusCode::NOT_FOUND, "Image not found").into_response(),
        Ok(result) => {
            let status = match result {
                QueueRequestResult::Queued | QueueRequestResult::Requeued => {
                    info!("Image {} queued for recognition", id);
                    StatusCode::ACCEPTED
                }
                _ => StatusCode::OK,
            };
            (status, Json(result)).into_response()
        }
        Err(err) => {
            warn!("Failed to queue image {} for recognition: {:#}", id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to queue image for recognition",
            )
                .into_response()
        }
    }
}

async fn get_image(
    State(ledger): State<GuardedImageLedger>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match ledger.get(&id) {
        Ok(Some(image)) => Json(image).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!("Failed to read image {}: {:#}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_species(
    State(catalog): State<GuardedSpeciesCatalog>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match catalog.get(&id) {
        Ok(Some(document)) => Json(document).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!("Failed to read species document {}: {:#}", id, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// =============================================================================
// Routers
// =============================================================================

pub fn make_recognition_routes(state: ServerState) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/start", post(start_worker))
        .route("/stop", post(stop_worker))
        .route("/process-one", post(process_one))
        .with_state(state)
}

pub fn make_image_routes(state: ServerState) -> Router {
    Router::new()
        .route("/{id}", get(get_image))
        .route("/{id}/recognize", post(request_recognition))
        .with_state(state)
}

pub fn make_species_routes(state: ServerState) -> Router {
    Router::new()
        .route("/{id}", get(get_species))
        .with_state(state)
}
