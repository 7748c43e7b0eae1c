//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{FakeRecognitionClient, TestClient, TestServer, BEAR_IMAGE_PATH};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_status() {
//!     let server = TestServer::spawn(FakeRecognitionClient::new()).await;
//!     let client = TestClient::new(server.base_url.clone());
//!
//!     let response = client.get_status().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{FakeCompletionsApi, FakeRecognitionClient, FakeReply};
pub use server::TestServer;
