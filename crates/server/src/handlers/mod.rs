//! HTTP request handlers.

pub mod auth;
pub mod common;
pub mod files;
pub mod health;
pub mod idp;
pub mod role_overrides;
pub mod service_accounts;
pub mod storage_elements;
pub mod sync;

pub use auth::*;
pub use files::*;
pub use health::*;
pub use idp::*;
pub use role_overrides::*;
pub use service_accounts::*;
pub use storage_elements::*;
pub use sync::*;
