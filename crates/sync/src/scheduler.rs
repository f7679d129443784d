//! Periodic sync loops.
//!
//! One task per enabled sync kind calls [`SyncEngine::run_pass`] on its own
//! interval. A pass failing on the local database halts that loop only; the
//! other loops keep running.

use crate::engine::SyncEngine;
use crate::metrics::SYNC_LOOPS_HALTED;
use artstore_core::SyncKind;
use artstore_core::config::SyncConfig;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Lifecycle state of one loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoopState {
    Disabled,
    Running,
    /// Stopped by a local database failure.
    Halted { error: String },
    Stopped,
}

/// Shared view of the loop states, readable from request handlers.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStatus {
    loops: Arc<RwLock<BTreeMap<SyncKind, LoopState>>>,
}

impl SchedulerStatus {
    pub fn get(&self, kind: SyncKind) -> LoopState {
        self.loops
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&kind)
            .cloned()
            .unwrap_or(LoopState::Disabled)
    }

    pub fn snapshot(&self) -> BTreeMap<SyncKind, LoopState> {
        SyncKind::ALL
            .into_iter()
            .map(|kind| (kind, self.get(kind)))
            .collect()
    }

    fn set(&self, kind: SyncKind, state: LoopState) {
        self.loops
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(kind, state);
    }
}

/// Owns the periodic loops of one engine.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    config: SyncConfig,
    status: SchedulerStatus,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>, config: SyncConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            engine,
            config,
            status: SchedulerStatus::default(),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.clone()
    }

    /// Spawn one loop per enabled kind. The first pass runs one interval
    /// after start. Calling `start` on a running scheduler does nothing.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !tasks.is_empty() {
            tracing::warn!("sync scheduler already started");
            return;
        }

        for kind in SyncKind::ALL {
            let loop_config = self.config.loop_for(kind);
            let needs_identity = kind == SyncKind::ServiceAccounts;
            if !loop_config.enabled || (needs_identity && !self.engine.accounts().is_configured()) {
                tracing::info!(kind = %kind, "sync loop disabled");
                self.status.set(kind, LoopState::Disabled);
                continue;
            }

            self.status.set(kind, LoopState::Running);
            tasks.push(tokio::spawn(run_loop(
                Arc::clone(&self.engine),
                kind,
                loop_config.interval(),
                self.status.clone(),
                self.shutdown.subscribe(),
            )));
        }
    }

    /// Signal every loop to stop and wait for them. A pass in progress is
    /// allowed to finish.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        let tasks = std::mem::take(
            &mut *self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "sync loop task panicked");
            }
        }
        tracing::info!("sync scheduler stopped");
    }
}

async fn run_loop(
    engine: Arc<SyncEngine>,
    kind: SyncKind,
    period: Duration,
    status: SchedulerStatus,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(kind = %kind, interval_secs = period.as_secs(), "sync loop started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match engine.run_pass(kind).await {
                    Ok(_) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!(
                            kind = %kind,
                            error = %e,
                            "control-plane database failure, halting sync loop"
                        );
                        SYNC_LOOPS_HALTED.inc();
                        status.set(kind, LoopState::Halted { error: e.to_string() });
                        return;
                    }
                    Err(e) => {
                        tracing::warn!(kind = %kind, error = %e, "sync pass failed");
                    }
                }
            }
        }
    }

    status.set(kind, LoopState::Stopped);
}
