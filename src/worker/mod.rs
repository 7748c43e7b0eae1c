//! Recognition queue worker.

mod queue_worker;

pub use queue_worker::{QueueWorker, WorkerPhase, WorkerStatus, DEFAULT_IDLE_INTERVAL};
