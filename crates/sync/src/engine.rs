//! The reconciliation engine.
//!
//! Every reconciliation, periodic or forced, goes through
//! [`SyncEngine::trigger`]: it takes the fence for `(kind, target)`, runs the
//! work on its own task under the per-target deadline and records the run.
//! Because the work runs on a spawned task that owns the fence guard, a
//! caller that goes away does not release the target early.

use crate::accounts::{AccountSyncStats, ServiceAccountReconciler};
use crate::error::{SyncError, SyncResult};
use crate::fence::{IDENTITY_TARGET, SyncFence};
use crate::files::{FileRegistryReconciler, FileSyncStats};
use crate::metrics::{SYNC_RUN_DURATION, SYNC_RUNS};
use crate::registry::{InfoSyncStats, StorageElementRegistry};
use artstore_core::config::SyncConfig;
use artstore_core::{ElementStatus, RunOutcome, SyncKind};
use artstore_metadata::MetadataStore;
use artstore_metadata::models::{StorageElementRow, SyncRunRow, SyncStateRow};
use artstore_upstream::{IdentityProvider, StorageNodeClient};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use uuid::Uuid;

/// Largest run history page.
pub const MAX_RUN_HISTORY: u32 = 1000;

/// What a reconciliation run is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTarget {
    Element(Uuid),
    IdentityProvider,
}

impl SyncTarget {
    /// Target id stored with the run; `None` for the identity provider.
    pub fn target_id(&self) -> Option<String> {
        match self {
            Self::Element(id) => Some(id.to_string()),
            Self::IdentityProvider => None,
        }
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(id) => write!(f, "{id}"),
            Self::IdentityProvider => f.write_str(IDENTITY_TARGET),
        }
    }
}

/// Counts produced by one run, depending on its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RunStats {
    Info(InfoSyncStats),
    Files(FileSyncStats),
    Accounts(AccountSyncStats),
}

/// Summary of a completed run, as recorded in the run history.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub kind: SyncKind,
    pub target_id: Option<String>,
    pub outcome: RunOutcome,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    pub duration_ms: u64,
    pub stats: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TryFrom<SyncRunRow> for RunSummary {
    type Error = SyncError;

    fn try_from(row: SyncRunRow) -> SyncResult<Self> {
        let duration = row.finished_at - row.started_at;
        Ok(Self {
            run_id: row.run_id,
            kind: SyncKind::parse(&row.sync_kind)?,
            target_id: row.target_id,
            outcome: RunOutcome::parse(&row.outcome)?,
            started_at: row.started_at,
            finished_at: row.finished_at,
            duration_ms: u64::try_from(duration.whole_milliseconds()).unwrap_or(0),
            stats: row
                .stats_json
                .as_deref()
                .and_then(|json| serde_json::from_str(json).ok()),
            error: row.error,
        })
    }
}

/// Outcome for one target of a pass.
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub target: String,
    pub run: Option<RunSummary>,
    pub error: Option<String>,
}

/// Result of one pass over all targets of a kind.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub kind: SyncKind,
    pub succeeded: u64,
    pub failed: u64,
    /// Targets skipped because a reconciliation was already in flight.
    pub in_progress: u64,
    /// Targets not attempted, such as offline elements in a file pass.
    pub skipped: u64,
    pub outcomes: Vec<TargetOutcome>,
}

impl PassReport {
    fn new(kind: SyncKind) -> Self {
        Self {
            kind,
            succeeded: 0,
            failed: 0,
            in_progress: 0,
            skipped: 0,
            outcomes: Vec::new(),
        }
    }
}

/// Owns the reconcilers, the fence and the run history.
pub struct SyncEngine {
    metadata: Arc<dyn MetadataStore>,
    registry: StorageElementRegistry,
    files: FileRegistryReconciler,
    accounts: ServiceAccountReconciler,
    fence: SyncFence,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        nodes: Arc<dyn StorageNodeClient>,
        identity: Option<Arc<dyn IdentityProvider>>,
        config: SyncConfig,
    ) -> Self {
        let fence = SyncFence::new();
        Self {
            registry: StorageElementRegistry::new(metadata.clone(), nodes.clone()),
            files: FileRegistryReconciler::new(metadata.clone(), nodes),
            accounts: ServiceAccountReconciler::new(metadata.clone(), identity, fence.clone()),
            fence,
            metadata,
            config,
        }
    }

    pub fn registry(&self) -> &StorageElementRegistry {
        &self.registry
    }

    pub fn files(&self) -> &FileRegistryReconciler {
        &self.files
    }

    pub fn accounts(&self) -> &ServiceAccountReconciler {
        &self.accounts
    }

    pub fn fence(&self) -> &SyncFence {
        &self.fence
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one reconciliation of one target now.
    ///
    /// Returns the recorded run, whose outcome may be `failed`, or
    /// [`SyncError::InProgress`] when the target is already being
    /// reconciled. Only a local database failure is returned as an error
    /// after the fence was taken.
    pub async fn trigger(self: &Arc<Self>, kind: SyncKind, target: SyncTarget) -> SyncResult<RunSummary> {
        let element = match (kind, target) {
            (SyncKind::ServiceAccounts, SyncTarget::IdentityProvider) => {
                self.accounts.identity()?;
                None
            }
            (SyncKind::StorageInfo | SyncKind::FileRegistry, SyncTarget::Element(id)) => {
                Some(self.registry.get(id).await?)
            }
            _ => {
                return Err(SyncError::Invalid(format!(
                    "{kind} sync cannot target {target}"
                )));
            }
        };

        let guard = self.fence.try_acquire(kind, &target.to_string())?;
        let engine = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _guard = guard;
            engine.execute(kind, target, element).await
        });
        handle
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    async fn execute(
        &self,
        kind: SyncKind,
        target: SyncTarget,
        element: Option<StorageElementRow>,
    ) -> SyncResult<RunSummary> {
        let started_at = OffsetDateTime::now_utc();
        let timer = Instant::now();

        let result = match tokio::time::timeout(
            self.config.target_timeout(),
            self.run_target(kind, element.as_ref()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout {
                kind,
                target: target.to_string(),
                secs: self.config.target_timeout_secs,
            }),
        };

        // The run cannot be recorded without the database; surface it instead.
        let result = match result {
            Err(e) if e.is_fatal() => {
                tracing::error!(kind = %kind, target = %target, error = %e, "sync run hit a database failure");
                SYNC_RUNS
                    .with_label_values(&[kind.as_str(), RunOutcome::Failed.as_str()])
                    .inc();
                return Err(e);
            }
            other => other,
        };

        if let Err(e) = &result
            && matches!(e, SyncError::Timeout { .. })
            && kind == SyncKind::StorageInfo
            && let Some(element) = &element
        {
            self.registry
                .mark_unreachable(element.element_id, &e.to_string())
                .await?;
        }

        let (outcome, stats, error) = match result {
            Ok(RunStats::Accounts(stats)) if stats.failed > 0 => (
                RunOutcome::Failed,
                Some(RunStats::Accounts(stats)),
                Some(format!("{} service accounts failed to reconcile", stats.failed)),
            ),
            Ok(stats) => (RunOutcome::Succeeded, Some(stats), None),
            Err(e) => (RunOutcome::Failed, None, Some(e.to_string())),
        };

        let stats_json = stats.as_ref().and_then(|s| {
            serde_json::to_string(s)
                .map_err(|e| {
                    tracing::error!(kind = %kind, error = %e, "failed to serialize sync stats");
                    e
                })
                .ok()
        });

        let row = SyncRunRow {
            run_id: Uuid::new_v4(),
            sync_kind: kind.as_str().to_string(),
            target_id: target.target_id(),
            outcome: outcome.as_str().to_string(),
            started_at,
            finished_at: OffsetDateTime::now_utc(),
            stats_json,
            error,
        };
        self.metadata.record_sync_run(&row).await?;

        let elapsed = timer.elapsed();
        SYNC_RUNS
            .with_label_values(&[kind.as_str(), outcome.as_str()])
            .inc();
        SYNC_RUN_DURATION
            .with_label_values(&[kind.as_str()])
            .observe(elapsed.as_secs_f64());

        match &row.error {
            Some(error) => tracing::warn!(
                kind = %kind,
                target = %target,
                duration_ms = elapsed.as_millis() as u64,
                error = %error,
                "sync run failed"
            ),
            None => tracing::debug!(
                kind = %kind,
                target = %target,
                duration_ms = elapsed.as_millis() as u64,
                "sync run succeeded"
            ),
        }

        RunSummary::try_from(row)
    }

    async fn run_target(
        &self,
        kind: SyncKind,
        element: Option<&StorageElementRow>,
    ) -> SyncResult<RunStats> {
        match (kind, element) {
            (SyncKind::StorageInfo, Some(element)) => {
                self.registry.sync_info(element).await.map(RunStats::Info)
            }
            (SyncKind::FileRegistry, Some(element)) => {
                self.files.reconcile(element).await.map(RunStats::Files)
            }
            (SyncKind::ServiceAccounts, None) => {
                self.accounts.reconcile().await.map(RunStats::Accounts)
            }
            _ => Err(SyncError::Invalid(format!("{kind} sync needs a matching target"))),
        }
    }

    /// Reconcile every target of one kind, isolating per-target failures.
    ///
    /// Storage info sync covers all elements; file sync skips elements
    /// currently marked offline. Returns an error only for a local database
    /// failure, after every started run has finished.
    pub async fn run_pass(self: &Arc<Self>, kind: SyncKind) -> SyncResult<PassReport> {
        let mut report = PassReport::new(kind);

        let targets: Vec<SyncTarget> = match kind {
            SyncKind::ServiceAccounts => {
                if self.accounts.is_configured() {
                    vec![SyncTarget::IdentityProvider]
                } else {
                    report.skipped += 1;
                    Vec::new()
                }
            }
            SyncKind::StorageInfo | SyncKind::FileRegistry => {
                let elements = self.metadata.list_storage_elements().await?;
                let mut targets = Vec::with_capacity(elements.len());
                for element in elements {
                    if kind == SyncKind::FileRegistry
                        && element.status == ElementStatus::Offline.as_str()
                    {
                        tracing::debug!(element_id = %element.element_id, "skipping offline element");
                        report.skipped += 1;
                        continue;
                    }
                    targets.push(SyncTarget::Element(element.element_id));
                }
                targets
            }
        };

        let results: Vec<(SyncTarget, SyncResult<RunSummary>)> = stream::iter(targets)
            .map(|target| {
                let engine = Arc::clone(self);
                async move { (target, engine.trigger(kind, target).await) }
            })
            .buffer_unordered(self.config.max_concurrent_targets.max(1))
            .collect()
            .await;

        let mut fatal = None;
        for (target, result) in results {
            let target = target.to_string();
            match result {
                Ok(run) => {
                    if run.outcome == RunOutcome::Succeeded {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                    }
                    report.outcomes.push(TargetOutcome {
                        target,
                        run: Some(run),
                        error: None,
                    });
                }
                Err(e) if e.is_fatal() => {
                    fatal.get_or_insert(e);
                }
                Err(e) => {
                    if matches!(e, SyncError::InProgress { .. }) {
                        report.in_progress += 1;
                    } else {
                        report.failed += 1;
                    }
                    report.outcomes.push(TargetOutcome {
                        target,
                        run: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        tracing::info!(
            kind = %kind,
            succeeded = report.succeeded,
            failed = report.failed,
            in_progress = report.in_progress,
            skipped = report.skipped,
            "sync pass complete"
        );
        Ok(report)
    }

    pub async fn sync_state(&self) -> SyncResult<SyncStateRow> {
        Ok(self.metadata.get_sync_state().await?)
    }

    /// Recent runs, newest first.
    pub async fn list_runs(
        &self,
        kind: Option<SyncKind>,
        target_id: Option<&str>,
        limit: Option<u32>,
    ) -> SyncResult<Vec<RunSummary>> {
        let limit = limit
            .unwrap_or(self.config.run_history_limit)
            .clamp(1, MAX_RUN_HISTORY);
        self.metadata
            .list_sync_runs(kind.map(|k| k.as_str()), target_id, limit)
            .await?
            .into_iter()
            .map(RunSummary::try_from)
            .collect()
    }
}
