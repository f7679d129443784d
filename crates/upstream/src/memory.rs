//! In-memory storage nodes and identity provider.
//!
//! These implement the client traits without any network and are used to
//! run the engine and the HTTP API in tests and local development.

use crate::error::{Upstream, UpstreamError, UpstreamResult};
use crate::identity::{ClientSpec, IdentityProvider, IdpUser, ServiceClient};
use crate::schema::v1::{NodeInfo, RemoteFile};
use crate::storage_node::StorageNodeClient;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone)]
struct MemoryNode {
    info: NodeInfo,
    files: Vec<RemoteFile>,
    reachable: bool,
    delay: Option<Duration>,
}

/// A set of simulated storage nodes keyed by base URL.
#[derive(Debug, Default)]
pub struct MemoryStorageNodes {
    nodes: Mutex<HashMap<String, MemoryNode>>,
    listing_calls: AtomicUsize,
}

impl MemoryStorageNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a node with an empty file listing.
    pub fn add_node(&self, base_url: &str, info: NodeInfo) {
        lock(&self.nodes).insert(
            base_url.to_string(),
            MemoryNode {
                info,
                files: Vec::new(),
                reachable: true,
                delay: None,
            },
        );
    }

    pub fn set_info(&self, base_url: &str, info: NodeInfo) {
        if let Some(node) = lock(&self.nodes).get_mut(base_url) {
            node.info = info;
        }
    }

    pub fn set_files(&self, base_url: &str, files: Vec<RemoteFile>) {
        if let Some(node) = lock(&self.nodes).get_mut(base_url) {
            node.files = files;
        }
    }

    pub fn set_reachable(&self, base_url: &str, reachable: bool) {
        if let Some(node) = lock(&self.nodes).get_mut(base_url) {
            node.reachable = reachable;
        }
    }

    /// Delay every response from this node.
    pub fn set_delay(&self, base_url: &str, delay: Option<Duration>) {
        if let Some(node) = lock(&self.nodes).get_mut(base_url) {
            node.delay = delay;
        }
    }

    /// Number of `list_files` calls served so far.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    async fn node(&self, base_url: &str) -> UpstreamResult<MemoryNode> {
        let node = lock(&self.nodes).get(base_url).cloned();
        let Some(node) = node else {
            return Err(UpstreamError::unavailable(
                Upstream::StorageNode,
                format!("no node at {base_url}"),
            ));
        };
        if let Some(delay) = node.delay {
            tokio::time::sleep(delay).await;
        }
        if !node.reachable {
            return Err(UpstreamError::unavailable(
                Upstream::StorageNode,
                format!("connection refused: {base_url}"),
            ));
        }
        Ok(node)
    }
}

#[async_trait]
impl StorageNodeClient for MemoryStorageNodes {
    async fn fetch_info(&self, base_url: &str) -> UpstreamResult<NodeInfo> {
        Ok(self.node(base_url).await?.info)
    }

    async fn list_files(&self, base_url: &str) -> UpstreamResult<Vec<RemoteFile>> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.node(base_url).await?.files)
    }
}

#[derive(Debug, Default)]
struct IdpState {
    clients: BTreeMap<String, ServiceClient>,
    users: Vec<(IdpUser, Vec<String>)>,
    next_id: u64,
}

/// A simulated identity provider.
#[derive(Debug)]
pub struct MemoryIdentityProvider {
    state: Mutex<IdpState>,
    reachable: Mutex<bool>,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self {
            state: Mutex::new(IdpState::default()),
            reachable: Mutex::new(true),
        }
    }
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, reachable: bool) {
        *lock(&self.reachable) = reachable;
    }

    /// Register a service client directly on the provider side.
    pub fn add_client(&self, client_id: &str, scopes: &[&str]) -> String {
        let mut state = lock(&self.state);
        let idp_id = Self::next_id(&mut state);
        state.clients.insert(
            idp_id.clone(),
            ServiceClient {
                idp_id: idp_id.clone(),
                client_id: client_id.to_string(),
                scopes: scopes.iter().map(|s| s.to_string()).collect(),
                enabled: true,
            },
        );
        idp_id
    }

    /// Snapshot of all clients.
    pub fn clients(&self) -> Vec<ServiceClient> {
        lock(&self.state).clients.values().cloned().collect()
    }

    pub fn client_by_client_id(&self, client_id: &str) -> Option<ServiceClient> {
        lock(&self.state)
            .clients
            .values()
            .find(|c| c.client_id == client_id)
            .cloned()
    }

    pub fn add_user(&self, id: &str, username: &str, groups: &[&str]) {
        lock(&self.state).users.push((
            IdpUser {
                id: id.to_string(),
                username: username.to_string(),
                enabled: true,
            },
            groups.iter().map(|g| g.to_string()).collect(),
        ));
    }

    fn next_id(state: &mut IdpState) -> String {
        state.next_id += 1;
        format!("kc-{:08}", state.next_id)
    }

    fn check_reachable(&self) -> UpstreamResult<()> {
        if *lock(&self.reachable) {
            Ok(())
        } else {
            Err(UpstreamError::unavailable(
                Upstream::IdentityProvider,
                "connection refused",
            ))
        }
    }

    fn not_found(what: &str) -> UpstreamError {
        UpstreamError::Rejected {
            upstream: Upstream::IdentityProvider,
            status: 404,
            message: format!("{what} not found"),
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn probe(&self) -> UpstreamResult<()> {
        self.check_reachable()
    }

    async fn list_service_clients(&self) -> UpstreamResult<Vec<ServiceClient>> {
        self.check_reachable()?;
        Ok(self.clients())
    }

    async fn create_client(&self, spec: &ClientSpec) -> UpstreamResult<String> {
        self.check_reachable()?;
        let mut state = lock(&self.state);
        if state.clients.values().any(|c| c.client_id == spec.client_id) {
            return Err(UpstreamError::Rejected {
                upstream: Upstream::IdentityProvider,
                status: 409,
                message: format!("client {} already exists", spec.client_id),
            });
        }
        let idp_id = Self::next_id(&mut state);
        state.clients.insert(
            idp_id.clone(),
            ServiceClient {
                idp_id: idp_id.clone(),
                client_id: spec.client_id.clone(),
                scopes: spec.scopes.clone(),
                enabled: spec.enabled,
            },
        );
        Ok(idp_id)
    }

    async fn update_client(&self, idp_id: &str, spec: &ClientSpec) -> UpstreamResult<()> {
        self.check_reachable()?;
        let mut state = lock(&self.state);
        let client = state
            .clients
            .get_mut(idp_id)
            .ok_or_else(|| Self::not_found("client"))?;
        client.scopes = spec.scopes.clone();
        client.enabled = spec.enabled;
        Ok(())
    }

    async fn delete_client(&self, idp_id: &str) -> UpstreamResult<()> {
        self.check_reachable()?;
        lock(&self.state)
            .clients
            .remove(idp_id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("client"))
    }

    async fn regenerate_secret(&self, idp_id: &str) -> UpstreamResult<String> {
        use base64::Engine as _;
        use rand::RngCore;

        self.check_reachable()?;
        if !lock(&self.state).clients.contains_key(idp_id) {
            return Err(Self::not_found("client"));
        }
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    async fn list_users(&self) -> UpstreamResult<Vec<IdpUser>> {
        self.check_reachable()?;
        Ok(lock(&self.state)
            .users
            .iter()
            .map(|(user, _)| user.clone())
            .collect())
    }

    async fn list_user_groups(&self, user_id: &str) -> UpstreamResult<Vec<String>> {
        self.check_reachable()?;
        lock(&self.state)
            .users
            .iter()
            .find(|(user, _)| user.id == user_id)
            .map(|(_, groups)| groups.clone())
            .ok_or_else(|| Self::not_found("user"))
    }
}
