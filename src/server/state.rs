use axum::extract::FromRef;

use crate::image_ledger::ImageLedger;
use crate::species_catalog::SpeciesCatalog;
use crate::worker::QueueWorker;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedImageLedger = Arc<dyn ImageLedger>;
pub type GuardedSpeciesCatalog = Arc<dyn SpeciesCatalog>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub image_ledger: GuardedImageLedger,
    pub species_catalog: GuardedSpeciesCatalog,
    pub worker: QueueWorker,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        image_ledger: GuardedImageLedger,
        species_catalog: GuardedSpeciesCatalog,
        worker: QueueWorker,
    ) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            image_ledger,
            species_catalog,
            worker,
            hash: env!("GIT_HASH").to_string(),
        }
    }
}

impl FromRef<ServerState> for GuardedImageLedger {
    fn from_ref(input: &ServerState) -> Self {
        input.image_ledger.clone()
    }
}

impl FromRef<ServerState> for GuardedSpeciesCatalog {
    fn from_ref(input: &ServerState) -> Self {
        input.species_catalog.clone()
    }
}

impl FromRef<ServerState> for QueueWorker {
    fn from_ref(input: &ServerState) -> Self {
        input.worker.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
