//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all recognition-server endpoints.
//!
//! When API routes or request formats change, update only this file.
#![allow(dead_code)]

use super::constants::*;
use reqwest::Response;
use std::time::Duration;

/// HTTP test client
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    // ========================================================================
    // Worker Control Endpoints
    // ========================================================================

    /// GET /v1/recognition/status
    pub async fn get_status(&self) -> Response {
        self.client
            .get(format!("{}/v1/recognition/status", self.base_url))
            .send()
            .await
            .expect("Status request failed")
    }

    /// POST /v1/recognition/start
    pub async fn start_worker(&self) -> Response {
        self.client
            .post(format!("{}/v1/recognition/start", self.base_url))
            .send()
            .await
            .expect("Start request failed")
    }

    /// POST /v1/recognition/stop
    pub async fn stop_worker(&self) -> Response {
        self.client
            .post(format!("{}/v1/recognition/stop", self.base_url))
            .send()
            .await
            .expect("Stop request failed")
    }

    /// POST /v1/recognition/process-one
    pub async fn process_one(&self) -> Response {
        self.client
            .post(format!("{}/v1/recognition/process-one", self.base_url))
            .send()
            .await
            .expect("Process-one request failed")
    }

    // ========================================================================
    // Image and Species Endpoints
    // ========================================================================

    /// POST /v1/images/{id}/recognize
    pub async fn request_recognition(&self, image_id: &str) -> Response {
        self.client
            .post(format!("{}/v1/images/{}/recognize", self.base_url, image_id))
            .send()
            .await
            .expect("Recognize request failed")
    }

    /// GET /v1/images/{id}
    pub async fn get_image(&self, image_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/images/{}", self.base_url, image_id))
            .send()
            .await
            .expect("Get image request failed")
    }

    /// GET /v1/species/{id}
    pub async fn get_species(&self, document_id: &str) -> Response {
        self.client
            .get(format!("{}/v1/species/{}", self.base_url, document_id))
            .send()
            .await
            .expect("Get species request failed")
    }
}
