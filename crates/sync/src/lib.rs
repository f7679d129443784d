//! Registry Reconciliation Engine for the Artstore control plane.
//!
//! This crate provides:
//! - The Storage Element Registry (node catalog and info sync)
//! - The File Registry Reconciler (three-way diff against node listings)
//! - The Service Account Reconciler (bidirectional identity provider sync)
//! - A per-target fence, the engine that runs and records reconciliations,
//!   and the periodic scheduler

pub mod accounts;
pub mod engine;
pub mod error;
pub mod fence;
pub mod files;
pub mod metrics;
pub mod registry;
pub mod scheduler;

pub use accounts::{
    AccountSyncStats, IssuedSecret, NewServiceAccount, ServiceAccountReconciler,
    ServiceAccountUpdate, hash_secret,
};
pub use engine::{PassReport, RunStats, RunSummary, SyncEngine, SyncTarget, TargetOutcome};
pub use error::{SyncError, SyncResult};
pub use fence::{FenceGuard, IDENTITY_TARGET, SyncFence};
pub use files::{FileRegistryReconciler, FileSyncStats, NewFile, RetentionUpdate, diff_listing};
pub use registry::{InfoSyncStats, NewStorageElement, StorageElementRegistry, StorageElementUpdate};
pub use scheduler::{LoopState, SchedulerStatus, SyncScheduler};
