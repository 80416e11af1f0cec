//! PlanManager - worker pool for session orchestration
//!
//! The submission interface never executes stages inline: it enqueues
//! the session id here, and the manager spawns one engine task per
//! session, bounded by a semaphore. Sessions are fully independent
//! units of work; the manager imposes no cross-session ordering.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::domain::ErrorRecord;
use crate::stages::ProviderSet;
use crate::state::SessionStore;

use super::{EngineOutcome, PlanEngine};

/// Scheduling failed because the manager is gone
#[derive(Debug, Error, PartialEq, Eq)]
#[error("orchestrator queue is closed")]
pub struct QueueClosed;

/// Handle used by the submission interface to enqueue work
#[derive(Clone)]
pub struct OrchestratorHandle {
    tx: mpsc::Sender<Uuid>,
}

impl OrchestratorHandle {
    /// Enqueue a session for orchestration
    pub async fn schedule(&self, session_id: Uuid) -> Result<(), QueueClosed> {
        debug!(%session_id, "schedule: called");
        self.tx.send(session_id).await.map_err(|_| QueueClosed)
    }
}

/// Worker pool driving session engines
pub struct PlanManager {
    config: OrchestratorConfig,
    store: SessionStore,
    providers: ProviderSet,
    rx: mpsc::Receiver<Uuid>,
    semaphore: Arc<Semaphore>,
    tasks: HashMap<Uuid, JoinHandle<EngineOutcome>>,
}

impl PlanManager {
    /// Create the manager and the handle used to feed it
    pub fn new(
        config: OrchestratorConfig,
        store: SessionStore,
        providers: ProviderSet,
    ) -> (Self, OrchestratorHandle) {
        debug!(
            max_concurrent = config.max_concurrent_sessions,
            deadline_secs = config.session_deadline_secs,
            "PlanManager::new: called"
        );
        let (tx, rx) = mpsc::channel(256);
        let manager = Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_sessions.max(1))),
            config,
            store,
            providers,
            rx,
            tasks: HashMap::new(),
        };
        (manager, OrchestratorHandle { tx })
    }

    /// Run the manager loop until shutdown
    pub async fn run(mut self, mut shutdown_rx: mpsc::Receiver<()>) {
        debug!("run: called");
        info!("PlanManager starting");

        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.reap_interval_secs.max(1)));

        loop {
            tokio::select! {
                scheduled = self.rx.recv() => {
                    match scheduled {
                        Some(session_id) => self.spawn_session(session_id),
                        None => {
                            debug!("run: queue closed");
                            break;
                        }
                    }
                }

                _ = interval.tick() => {
                    self.reap_finished().await;
                }

                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Spawn one engine task for a session
    fn spawn_session(&mut self, session_id: Uuid) {
        if self.tasks.contains_key(&session_id) {
            debug!(%session_id, "spawn_session: already running");
            return;
        }

        let engine = PlanEngine::new(
            session_id,
            self.store.clone(),
            self.providers.clone(),
            Duration::from_secs(self.config.session_deadline_secs),
        );
        let semaphore = self.semaphore.clone();

        let handle = tokio::spawn(async move {
            // The permit is acquired inside the task so a full pool queues
            // sessions without stalling the manager loop
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(%session_id, "spawn_session task: semaphore closed");
                    return EngineOutcome::Skipped { session_id };
                }
            };
            engine.run().await
        });

        self.tasks.insert(session_id, handle);
        info!(%session_id, active = self.tasks.len(), "Scheduled session worker");
    }

    /// Collect finished worker tasks and record their outcomes
    async fn reap_finished(&mut self) {
        let finished: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();

        for session_id in finished {
            let Some(handle) = self.tasks.remove(&session_id) else {
                continue;
            };
            match handle.await {
                Ok(EngineOutcome::Completed { .. }) => {
                    debug!(%session_id, "reap_finished: session completed");
                }
                Ok(EngineOutcome::Failed { error, .. }) => {
                    debug!(%session_id, kind = %error.kind, "reap_finished: session failed");
                }
                Ok(EngineOutcome::Skipped { .. }) => {
                    debug!(%session_id, "reap_finished: worker skipped");
                }
                Err(e) => {
                    // A panicking worker is fatal to its session only,
                    // never to the process or to other sessions
                    error!(%session_id, error = %e, "Session worker panicked");
                    let _ = self
                        .store
                        .fail(&session_id, ErrorRecord::internal("session worker panicked"));
                }
            }
        }
    }

    /// Drain in-flight sessions, then abort and fail the stragglers
    async fn shutdown(&mut self) {
        debug!(active = self.tasks.len(), "shutdown: called");
        info!("PlanManager shutting down with {} active sessions", self.tasks.len());

        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.shutdown_timeout_secs);
        while !self.tasks.is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.reap_finished().await;
        }

        if !self.tasks.is_empty() {
            warn!("Aborting {} session workers after shutdown timeout", self.tasks.len());
            for (session_id, handle) in self.tasks.drain() {
                handle.abort();
                let _ = self.store.fail(
                    &session_id,
                    ErrorRecord::cancelled("daemon shutdown before completion"),
                );
            }
        }

        info!("PlanManager shutdown complete");
    }
}
