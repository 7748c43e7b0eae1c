//! Shared constants for end-to-end tests
//!
//! When test data changes (image paths, species names, timeouts),
//! update only this file.
#![allow(dead_code)]

// ============================================================================
// Server Configuration
// ============================================================================

/// Base URL relative image paths are resolved against in tests
pub const PUBLIC_BASE_URL: &str = "http://photos.test";

/// Worker idle wait used by test servers, short enough to keep tests fast
pub const WORKER_IDLE_INTERVAL_MS: u64 = 20;

// ============================================================================
// Test Images
// ============================================================================

pub const BEAR_IMAGE_PATH: &str = "/uploads/bear-1.jpg";
pub const BEAR_IMAGE_PATH_2: &str = "/uploads/bear-2.jpg";
pub const OAK_IMAGE_PATH: &str = "/uploads/oak.jpg";
pub const BLURRY_IMAGE_PATH: &str = "/uploads/blurry.jpg";

// ============================================================================
// Test Species
// ============================================================================

pub const BEAR_SCIENTIFIC: &str = "Ursus arctos";
pub const BEAR_COMMON: &str = "Brown bear";
pub const OAK_SCIENTIFIC: &str = "Quercus robur";
pub const OAK_COMMON: &str = "English oak";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Poll interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Maximum time to wait for the worker to drain the queue (milliseconds)
pub const QUEUE_DRAIN_TIMEOUT_MS: u64 = 5000;

/// HTTP request timeout for test client (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;
