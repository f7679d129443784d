//! Server test utilities.

use artstore_core::config::{AppConfig, MetadataConfig};
use artstore_core::{ElementStatus, FileStatus, StorageMode};
use artstore_metadata::{MetadataStore, SqliteStore};
use artstore_server::{AppState, create_router};
use artstore_sync::{SchedulerStatus, SyncEngine};
use artstore_upstream::{
    IdentityProvider, MemoryIdentityProvider, MemoryStorageNodes, NodeInfo, RemoteFile,
    StorageNodeClient,
};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

/// Identity forwarded by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub subject: &'static str,
    pub groups: &'static str,
}

/// Member of the default admin group.
#[allow(dead_code)]
pub const ADMIN: Caller = Caller {
    subject: "subject-admin",
    groups: "artstore-admins",
};

/// Member of the default readonly group.
#[allow(dead_code)]
pub const READER: Caller = Caller {
    subject: "subject-reader",
    groups: "/artstore-viewers",
};

/// Identified, but in no configured group.
#[allow(dead_code)]
pub const STRANGER: Caller = Caller {
    subject: "subject-stranger",
    groups: "marketing",
};

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub nodes: Arc<MemoryStorageNodes>,
    pub idp: Arc<MemoryIdentityProvider>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Server with in-memory storage nodes and identity provider.
    pub async fn new() -> Self {
        Self::build(true, |_| {}).await
    }

    /// Server without an identity provider.
    pub async fn without_identity() -> Self {
        Self::build(false, |_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        Self::build(true, modifier).await
    }

    async fn build<F>(with_identity: bool, modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("artstore.db");

        let mut config = AppConfig::for_testing();
        config.metadata = MetadataConfig::Sqlite {
            path: db_path.clone(),
            query_timeout_secs: None,
        };
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );
        let nodes = Arc::new(MemoryStorageNodes::new());
        let idp = Arc::new(MemoryIdentityProvider::new());
        let identity = with_identity.then(|| idp.clone() as Arc<dyn IdentityProvider>);

        let engine = Arc::new(SyncEngine::new(
            metadata.clone(),
            nodes.clone() as Arc<dyn StorageNodeClient>,
            identity,
            config.sync.clone(),
        ));
        let state = AppState::new(config, metadata, engine, SchedulerStatus::default());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            nodes,
            idp,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Send a request and decode the JSON response body.
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        caller: Option<Caller>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header("X-Auth-Subject", caller.subject)
                .header("X-Auth-Username", caller.subject)
                .header("X-Auth-Groups", caller.groups);
        }
        self.send(builder, body).await
    }

    /// Send a prepared request builder.
    pub async fn send(
        &self,
        mut builder: axum::http::request::Builder,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, caller: Caller) -> (StatusCode, Value) {
        self.request("GET", uri, None, Some(caller)).await
    }

    pub async fn post(&self, uri: &str, body: Value, caller: Caller) -> (StatusCode, Value) {
        self.request("POST", uri, Some(body), Some(caller)).await
    }

    pub async fn put(&self, uri: &str, body: Value, caller: Caller) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(body), Some(caller)).await
    }

    pub async fn delete(&self, uri: &str, caller: Caller) -> (StatusCode, Value) {
        self.request("DELETE", uri, None, Some(caller)).await
    }

    /// Start a simulated node and register it through the API.
    pub async fn register_node(&self, name: &str) -> Value {
        let base_url = node_url(name);
        self.nodes.add_node(&base_url, node_info(name));
        let (status, body) = self
            .post(
                "/v1/storage-elements",
                serde_json::json!({ "name": name, "base_url": base_url }),
                ADMIN,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body
    }
}

pub fn node_url(name: &str) -> String {
    format!("http://{name}.storage.local:8010")
}

pub fn node_info(reported_id: &str) -> NodeInfo {
    NodeInfo {
        element_id: reported_id.to_string(),
        mode: StorageMode::Rw,
        status: ElementStatus::Online,
        capacity_bytes: 10_000,
        used_bytes: 2_500,
    }
}

#[allow(dead_code)]
pub fn remote_file(file_id: Uuid, checksum: &str) -> RemoteFile {
    RemoteFile {
        file_id,
        checksum: Some(checksum.to_string()),
        size_bytes: 42,
        status: FileStatus::Active,
        filename: Some(format!("{checksum}.bin")),
        retention_policy: None,
        expires_at: None,
    }
}
