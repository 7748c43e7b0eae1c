pub mod config;
mod http_layers;
pub mod metrics;
mod recognition_routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use recognition_routes::{ProcessOneResponse, RecognitionStatusResponse, WorkerControlResponse};
pub use server::{make_app, make_metrics_app, run_server};
pub use state::ServerState;
