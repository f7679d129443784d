//! Clients for the peers the Artstore control plane mirrors.
//!
//! This crate provides:
//! - The storage node v1 client (info and paged file listing)
//! - The identity provider admin client (Keycloak-style)
//! - Strict wire schemas and a bounded retry policy
//! - In-memory implementations of both client traits

pub mod error;
pub mod identity;
pub mod memory;
pub mod retry;
pub mod schema;
pub mod storage_node;

pub use error::{Upstream, UpstreamError, UpstreamResult};
pub use identity::{ClientSpec, IdentityProvider, IdpUser, KeycloakClient, ServiceClient};
pub use memory::{MemoryIdentityProvider, MemoryStorageNodes};
pub use retry::RetryPolicy;
pub use schema::v1::{NodeInfo, RemoteFile};
pub use storage_node::{HttpStorageNodeClient, StorageNodeClient};

use artstore_core::config::{IdentityConfig, StorageNodesConfig};
use std::sync::Arc;

/// Create the storage node client from configuration.
pub fn storage_nodes_from_config(
    config: &StorageNodesConfig,
) -> UpstreamResult<Arc<dyn StorageNodeClient>> {
    config.validate().map_err(UpstreamError::Config)?;
    let client = HttpStorageNodeClient::new(
        config.request_timeout(),
        RetryPolicy::from_config(&config.retry),
        config.listing_page_size,
    )?;
    Ok(Arc::new(client))
}

/// Create the identity provider client from configuration.
pub fn identity_from_config(config: &IdentityConfig) -> UpstreamResult<Arc<dyn IdentityProvider>> {
    config.validate().map_err(UpstreamError::Config)?;
    let client = KeycloakClient::new(
        &config.base_url,
        &config.realm,
        &config.client_id,
        &config.client_secret,
        config.request_timeout(),
        RetryPolicy::from_config(&config.retry),
    )?;
    Ok(Arc::new(client))
}
