//! The single long-running loop that drains eligible images.

use crate::recognition::{ProcessingOutcome, RecognitionOrchestrator};
use crate::server::metrics;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_IDLE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerPhase {
    Idle,
    Running,
    /// Stop requested; the loop exits at the top of its next iteration.
    Stopping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatus {
    /// True while a loop is alive, including while it is stopping.
    pub is_running: bool,
    pub phase: WorkerPhase,
    /// Images processed to DONE or FAILED since boot.
    pub processed_count: u64,
    /// The subset of `processed_count` that ended FAILED.
    pub failed_count: u64,
    pub idle_interval_ms: u64,
}

struct ControlState {
    phase: WorkerPhase,
    stop_token: CancellationToken,
    loop_handle: Option<JoinHandle<()>>,
    /// Bumped on every start so a loop that exits late cannot reset the
    /// phase of the loop that replaced it.
    generation: u64,
}

struct WorkerInner {
    orchestrator: Arc<RecognitionOrchestrator>,
    idle_interval: Duration,
    state: Mutex<ControlState>,
    /// Held for the duration of one claim+process, by the loop or by
    /// `process_one`.
    processing_gate: tokio::sync::Mutex<()>,
    processed_count: AtomicU64,
    failed_count: AtomicU64,
}

/// Cheaply cloneable handle to the recognition worker.
#[derive(Clone)]
pub struct QueueWorker {
    inner: Arc<WorkerInner>,
}

impl QueueWorker {
    pub fn new(orchestrator: Arc<RecognitionOrchestrator>, idle_interval: Duration) -> Self {
        Self {
            inner: Arc::new(WorkerInner {
                orchestrator,
                idle_interval,
                state: Mutex::new(ControlState {
                    phase: WorkerPhase::Idle,
                    stop_token: CancellationToken::new(),
                    loop_handle: None,
                    generation: 0,
                }),
                processing_gate: tokio::sync::Mutex::new(()),
                processed_count: AtomicU64::new(0),
                failed_count: AtomicU64::new(0),
            }),
        }
    }

    /// Starts the loop in the background. Returns false if it was already running.
    ///
    /// When called while a previous loop is still stopping, the new loop waits
    /// for the old one to exit before its first claim.
    pub fn start(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.phase == WorkerPhase::Running {
            return false;
        }

        let previous = state.loop_handle.take();
        let token = CancellationToken::new();
        state.stop_token = token.clone();
        state.phase = WorkerPhase::Running;
        state.generation += 1;
        let generation = state.generation;

        let inner = self.inner.clone();
        state.loop_handle = Some(tokio::spawn(async move {
            if let Some(previous) = previous {
                if let Err(e) = previous.await {
                    warn!("Previous recognition loop ended abnormally: {}", e);
                }
            }
            inner.run(token).await;
            inner.finish(generation);
        }));
        metrics::set_worker_running(true);
        true
    }

    /// Requests the loop to stop. Returns false if it was not running.
    ///
    /// Does not wait: an in-flight image finishes processing first.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.phase != WorkerPhase::Running {
            return false;
        }
        state.phase = WorkerPhase::Stopping;
        state.stop_token.cancel();
        info!("Recognition worker stop requested");
        true
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.state.lock().unwrap().loop_handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Recognition loop ended abnormally: {}", e);
            }
        }
    }

    pub fn status(&self) -> WorkerStatus {
        let phase = self.inner.state.lock().unwrap().phase;
        WorkerStatus {
            is_running: phase != WorkerPhase::Idle,
            phase,
            processed_count: self.inner.processed_count.load(Ordering::Relaxed),
            failed_count: self.inner.failed_count.load(Ordering::Relaxed),
            idle_interval_ms: self.inner.idle_interval.as_millis() as u64,
        }
    }

    /// Claims and processes exactly one eligible image, same as one loop
    /// iteration. Never runs concurrently with the loop's own processing.
    pub async fn process_one(&self) -> anyhow::Result<Option<ProcessingOutcome>> {
        let _gate = self.inner.processing_gate.lock().await;
        self.inner.process_once().await
    }
}

impl WorkerInner {
    async fn run(&self, stop: CancellationToken) {
        info!(
            "Recognition worker starting (idle_interval={}ms)",
            self.idle_interval.as_millis()
        );

        loop {
            if stop.is_cancelled() {
                break;
            }

            let result = {
                let _gate = self.processing_gate.lock().await;
                self.process_once().await
            };

            match result {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => error!("Recognition worker iteration failed: {:#}", e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.idle_interval) => {}
                _ = stop.cancelled() => break,
            }
        }

        info!("Recognition worker stopped");
    }

    async fn process_once(&self) -> anyhow::Result<Option<ProcessingOutcome>> {
        let outcome = self.orchestrator.process_next_eligible_image().await?;
        if let Some(outcome) = &outcome {
            self.processed_count.fetch_add(1, Ordering::Relaxed);
            if !outcome.success {
                self.failed_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(outcome)
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.generation == generation {
            state.phase = WorkerPhase::Idle;
            metrics::set_worker_running(false);
        }
    }
}
