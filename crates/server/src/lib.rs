//! HTTP control plane for Artstore.
//!
//! This crate provides:
//! - Storage element, file registry and service account administration
//! - Role overrides and the gateway identity middleware
//! - Forced syncs and sync observability (state, run history, `/metrics`)

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{AdminUser, TraceId};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
