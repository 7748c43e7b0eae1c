//! Species Recognition Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod image_ledger;
pub mod recognition;
pub mod server;
pub mod species_catalog;
pub mod sqlite_persistence;
pub mod worker;

// Re-export commonly used types for convenience
pub use image_ledger::{Image, ImageLedger, ImageStatus, SqliteImageLedger};
pub use recognition::{RecognitionClient, RecognitionOrchestrator};
pub use server::{run_server, RequestsLoggingLevel};
pub use species_catalog::{SpeciesCatalog, SpeciesDocument, SqliteSpeciesCatalog};
pub use worker::QueueWorker;
