//! Repository traits for catalog operations.

pub mod files;
pub mod role_overrides;
pub mod service_accounts;
pub mod storage_elements;
pub mod sync;

pub use files::FileRepo;
pub use role_overrides::RoleOverrideRepo;
pub use service_accounts::ServiceAccountRepo;
pub use storage_elements::StorageElementRepo;
pub use sync::{SyncRunRepo, SyncStateRepo};
