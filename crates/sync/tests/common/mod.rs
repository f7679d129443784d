//! Shared fixtures for engine tests.

#![allow(dead_code)]

use artstore_core::config::{AppConfig, SyncConfig};
use artstore_core::{ElementStatus, FileStatus, StorageMode};
use artstore_metadata::models::StorageElementRow;
use artstore_metadata::{MetadataStore, SqliteStore};
use artstore_sync::{NewStorageElement, SyncEngine};
use artstore_upstream::{
    IdentityProvider, MemoryIdentityProvider, MemoryStorageNodes, NodeInfo, RemoteFile,
    StorageNodeClient,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

/// Engine wired to a temporary SQLite store and in-memory peers.
pub struct TestEngine {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<SqliteStore>,
    pub nodes: Arc<MemoryStorageNodes>,
    pub idp: Arc<MemoryIdentityProvider>,
    _temp_dir: TempDir,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::build(true, |_| {}).await
    }

    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut SyncConfig),
    {
        Self::build(true, modifier).await
    }

    /// Engine with no identity provider configured.
    pub async fn without_identity() -> Self {
        Self::build(false, |_| {}).await
    }

    async fn build<F>(with_identity: bool, modifier: F) -> Self
    where
        F: FnOnce(&mut SyncConfig),
    {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let store = Arc::new(
            SqliteStore::new(temp_dir.path().join("artstore.db"), None)
                .await
                .expect("open store"),
        );
        let nodes = Arc::new(MemoryStorageNodes::new());
        let idp = Arc::new(MemoryIdentityProvider::new());

        let mut config = AppConfig::for_testing().sync;
        modifier(&mut config);

        let identity = with_identity.then(|| idp.clone() as Arc<dyn IdentityProvider>);
        let engine = Arc::new(SyncEngine::new(
            store.clone() as Arc<dyn MetadataStore>,
            nodes.clone() as Arc<dyn StorageNodeClient>,
            identity,
            config,
        ));

        Self {
            engine,
            store,
            nodes,
            idp,
            _temp_dir: temp_dir,
        }
    }

    /// Start a simulated node and register it.
    pub async fn register_node(&self, name: &str) -> StorageElementRow {
        let base_url = node_url(name);
        self.nodes.add_node(&base_url, node_info(name));
        self.engine
            .registry()
            .register(NewStorageElement {
                name: name.to_string(),
                base_url,
                description: None,
            })
            .await
            .expect("register node")
    }

    /// A second engine over the same store, talking to other peers.
    pub fn engine_with(
        &self,
        nodes: Arc<dyn StorageNodeClient>,
        identity: Option<Arc<dyn IdentityProvider>>,
    ) -> Arc<SyncEngine> {
        Arc::new(SyncEngine::new(
            self.store.clone() as Arc<dyn MetadataStore>,
            nodes,
            identity,
            AppConfig::for_testing().sync,
        ))
    }

    pub fn set_files(&self, element: &StorageElementRow, files: Vec<RemoteFile>) {
        self.nodes.set_files(&element.base_url, files);
    }

    pub fn set_delay(&self, element: &StorageElementRow, delay: Duration) {
        self.nodes.set_delay(&element.base_url, Some(delay));
    }
}

pub fn node_url(name: &str) -> String {
    format!("http://{name}.storage.local:8010")
}

pub fn node_info(reported_id: &str) -> NodeInfo {
    NodeInfo {
        element_id: reported_id.to_string(),
        mode: StorageMode::Edit,
        status: ElementStatus::Online,
        capacity_bytes: 1_000_000,
        used_bytes: 1_000,
    }
}

pub fn remote_file(file_id: Uuid, checksum: &str) -> RemoteFile {
    RemoteFile {
        file_id,
        checksum: Some(checksum.to_string()),
        size_bytes: 100,
        status: FileStatus::Active,
        filename: Some(format!("{checksum}.bin")),
        retention_policy: None,
        expires_at: None,
    }
}

/// Poll `check` every 20 ms until it returns true or `timeout` passes.
pub async fn wait_for<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
