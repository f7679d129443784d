//! Per-target mutual exclusion for reconciliation runs.
//!
//! The fence is keyed by `(sync kind, target)`. Acquiring a held key fails
//! immediately instead of waiting, so racing callers get a clear
//! in-progress answer. The key is released when the [`FenceGuard`] drops,
//! which happens when the run itself finishes, not when a caller gives up.

use crate::error::{SyncError, SyncResult};
use crate::metrics;
use artstore_core::SyncKind;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fence target for service-account sync, which has no per-node scope.
pub const IDENTITY_TARGET: &str = "identity-provider";

type FenceKey = (SyncKind, String);

/// Set of targets with a reconciliation in flight.
#[derive(Debug, Clone, Default)]
pub struct SyncFence {
    held: Arc<Mutex<HashSet<FenceKey>>>,
}

impl SyncFence {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<FenceKey>> {
        self.held.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Take the fence for a target, or fail with [`SyncError::InProgress`].
    pub fn try_acquire(&self, kind: SyncKind, target: &str) -> SyncResult<FenceGuard> {
        let key = (kind, target.to_string());
        if !self.lock().insert(key.clone()) {
            metrics::FENCE_REJECTIONS
                .with_label_values(&[kind.as_str()])
                .inc();
            tracing::debug!(kind = %kind, target, "sync fence held, rejecting");
            return Err(SyncError::InProgress {
                kind,
                target: target.to_string(),
            });
        }
        Ok(FenceGuard {
            fence: self.clone(),
            key,
        })
    }

    pub fn is_held(&self, kind: SyncKind, target: &str) -> bool {
        self.lock().contains(&(kind, target.to_string()))
    }

    /// Number of targets currently being reconciled.
    pub fn in_flight(&self) -> usize {
        self.lock().len()
    }
}

/// Releases its fence key on drop.
#[derive(Debug)]
pub struct FenceGuard {
    fence: SyncFence,
    key: FenceKey,
}

impl Drop for FenceGuard {
    fn drop(&mut self) {
        self.fence.lock().remove(&self.key);
    }
}
