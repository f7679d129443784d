//! Core domain types and shared logic for the Artstore control plane.
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Storage element modes and statuses (mirrored from storage nodes)
//! - File record statuses and retention policies
//! - Service account statuses, provenance and scope rules
//! - Access roles and the role resolver
//! - Sync kinds and run outcomes
//! - Configuration

pub mod config;
pub mod error;
pub mod file;
pub mod role;
pub mod service_account;
pub mod storage_element;
pub mod sync;

pub use error::{Error, Result};
pub use file::{FileStatus, RetentionPolicy};
pub use role::{Role, effective_role, highest_role, map_groups_to_role, resolve_access};
pub use service_account::{AccountSource, AccountStatus, normalize_scopes, validate_client_id};
pub use storage_element::{ElementStatus, StorageMode};
pub use sync::{RunOutcome, SyncKind};
