//! Integration tests for service accounts and identity provider sync.

mod common;

use artstore_core::SyncKind;
use artstore_sync::IDENTITY_TARGET;
use artstore_upstream::{ClientSpec, IdentityProvider};
use axum::http::StatusCode;
use common::{ADMIN, READER, TestServer};
use serde_json::{Value, json};

async fn create_account(server: &TestServer, client_id: &str, scopes: &[&str]) -> Value {
    let (status, body) = server
        .post(
            "/v1/service-accounts",
            json!({ "client_id": client_id, "scopes": scopes }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body
}

#[tokio::test]
async fn test_create_pushes_client_to_identity_provider() {
    let server = TestServer::new().await;

    let account = create_account(&server, "ingest-worker", &["files:write", "files:read", "files:read"]).await;
    assert_eq!(account["client_id"], "ingest-worker");
    assert_eq!(account["scopes"], json!(["files:read", "files:write"]));
    assert_eq!(account["status"], "active");
    assert_eq!(account["source"], "local");
    assert_eq!(account["has_secret"], false);
    assert!(account.get("secret_hash").is_none());

    let remote = server.idp.client_by_client_id("ingest-worker").unwrap();
    assert_eq!(account["idp_client_id"], remote.idp_id);
    assert_eq!(remote.scopes, vec!["files:read", "files:write"]);
    assert!(remote.enabled);

    let (status, body) = server
        .post(
            "/v1/service-accounts",
            json!({ "client_id": "ingest-worker" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");
}

#[tokio::test]
async fn test_create_validates_client_id_and_scopes() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post("/v1/service-accounts", json!({ "client_id": "Bad Name" }), ADMIN)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = server
        .post(
            "/v1/service-accounts",
            json!({ "client_id": "worker", "scopes": ["FILES READ"] }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_while_provider_down_is_deferred_to_sync() {
    let server = TestServer::new().await;
    server.idp.set_reachable(false);

    let account = create_account(&server, "batch-job", &["files:read"]).await;
    assert!(account["idp_client_id"].is_null());

    server.idp.set_reachable(true);
    let (status, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executed"], true);
    assert_eq!(body["run"]["kind"], "service_accounts");
    assert_eq!(body["run"]["outcome"], "succeeded");
    assert_eq!(body["run"]["stats"]["created_remote"], 1);

    let id = account["account_id"].as_str().unwrap();
    let (_, account) = server
        .get(&format!("/v1/service-accounts/{id}"), READER)
        .await;
    let remote = server.idp.client_by_client_id("batch-job").unwrap();
    assert_eq!(account["idp_client_id"], remote.idp_id);
}

#[tokio::test]
async fn test_update_pushes_scopes_and_status() {
    let server = TestServer::new().await;
    let account = create_account(&server, "ingest-worker", &["files:read"]).await;
    let uri = format!("/v1/service-accounts/{}", account["account_id"].as_str().unwrap());

    let (status, updated) = server
        .put(
            &uri,
            json!({ "scopes": ["files:write", "files:read"], "status": "suspended" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["scopes"], json!(["files:read", "files:write"]));
    assert_eq!(updated["status"], "suspended");
    assert!(updated["last_synced_at"].is_string());

    let remote = server.idp.client_by_client_id("ingest-worker").unwrap();
    assert_eq!(remote.scopes, vec!["files:read", "files:write"]);
    assert!(!remote.enabled);

    let (status, _) = server.put(&uri, json!({ "status": "active" }), READER).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_rotate_secret_returns_secret_once() {
    let server = TestServer::new().await;
    let account = create_account(&server, "ingest-worker", &[]).await;
    let id = account["account_id"].as_str().unwrap();

    let (status, issued) = server
        .post(
            &format!("/v1/service-accounts/{id}/rotate-secret"),
            json!({}),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(issued["account_id"], id);
    assert_eq!(issued["client_id"], "ingest-worker");
    let secret = issued["client_secret"].as_str().unwrap();
    assert!(secret.len() >= 32);
    assert!(issued["rotated_at"].is_string());

    let (_, account) = server
        .get(&format!("/v1/service-accounts/{id}"), READER)
        .await;
    assert_eq!(account["has_secret"], true);
    assert!(account["secret_rotated_at"].is_string());
    assert!(!account.to_string().contains(secret));
}

#[tokio::test]
async fn test_rotate_without_identity_provider() {
    let server = TestServer::without_identity().await;
    let account = create_account(&server, "ingest-worker", &[]).await;
    let id = account["account_id"].as_str().unwrap();

    let (status, body) = server
        .post(
            &format!("/v1/service-accounts/{id}/rotate-secret"),
            json!({}),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "identity_provider_unavailable");
}

#[tokio::test]
async fn test_delete_removes_remote_client() {
    let server = TestServer::new().await;
    let account = create_account(&server, "ingest-worker", &[]).await;
    let uri = format!("/v1/service-accounts/{}", account["account_id"].as_str().unwrap());

    let (status, _) = server.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(server.idp.client_by_client_id("ingest-worker").is_none());

    let (status, _) = server.get(&uri, READER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sync_imports_remote_only_clients() {
    let server = TestServer::new().await;
    server.idp.add_client("legacy-exporter", &["files:read"]);

    let (status, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["stats"]["created_local"], 1);

    let (_, body) = server.get("/v1/service-accounts", READER).await;
    let accounts = body["service_accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["client_id"], "legacy-exporter");
    assert_eq!(accounts[0]["source"], "identity_provider");
    assert_eq!(accounts[0]["scopes"], json!(["files:read"]));

    let (_, state) = server.get("/v1/sync/state", READER).await;
    assert!(state["last_account_sync_at"].is_string());

    // Nothing left to do on the second pass.
    let (_, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(body["run"]["stats"]["created_local"], 0);
    assert_eq!(body["run"]["stats"]["created_remote"], 0);
    assert_eq!(body["run"]["stats"]["updated"], 0);
}

#[tokio::test]
async fn test_local_scopes_win_over_remote_drift() {
    let server = TestServer::new().await;
    create_account(&server, "ingest-worker", &["files:read"]).await;
    let remote = server.idp.client_by_client_id("ingest-worker").unwrap();

    // Someone edits the client directly on the provider.
    let drifted = ClientSpec {
        client_id: "ingest-worker".to_string(),
        scopes: vec!["admin:all".to_string()],
        enabled: false,
        description: None,
    };
    server.idp.update_client(&remote.idp_id, &drifted).await.unwrap();

    let (_, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(body["run"]["outcome"], "succeeded");
    assert_eq!(body["run"]["stats"]["updated"], 1);

    let remote = server.idp.client_by_client_id("ingest-worker").unwrap();
    assert_eq!(remote.scopes, vec!["files:read"]);
    assert!(remote.enabled);
}

#[tokio::test]
async fn test_idp_sync_unreachable_records_failed_run() {
    let server = TestServer::new().await;
    server.idp.set_reachable(false);

    let (status, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["outcome"], "failed");

    let (_, state) = server.get("/v1/sync/state", READER).await;
    assert!(state["last_account_sync_at"].is_null());
}

#[tokio::test]
async fn test_idp_status() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/v1/idp/status", READER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], true);
    assert_eq!(body["reachable"], true);
    assert!(body["error"].is_null());

    server.idp.set_reachable(false);
    let (_, body) = server.get("/v1/idp/status", READER).await;
    assert_eq!(body["reachable"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_idp_endpoints_without_identity_provider() {
    let server = TestServer::without_identity().await;

    let (status, body) = server.get("/v1/idp/status", READER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["configured"], false);
    assert!(body["reachable"].is_null());

    let (status, body) = server.post("/v1/idp/sync", json!({}), ADMIN).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "identity_provider_unavailable");

    // Local administration keeps working.
    let account = create_account(&server, "ingest-worker", &["files:read"]).await;
    assert!(account["idp_client_id"].is_null());
}

#[tokio::test]
async fn test_account_changes_during_sync_are_conflict() {
    let server = TestServer::new().await;
    let account = create_account(&server, "ingest-worker", &["files:read"]).await;
    let uri = format!("/v1/service-accounts/{}", account["account_id"].as_str().unwrap());

    let guard = server
        .state
        .engine
        .fence()
        .try_acquire(SyncKind::ServiceAccounts, IDENTITY_TARGET)
        .unwrap();

    let (status, body) = server.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("in progress"));
    let (status, _) = server
        .post("/v1/service-accounts", json!({ "client_id": "backup-job" }), ADMIN)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = server.get(&uri, READER).await;
    assert_eq!(status, StatusCode::OK);

    drop(guard);
    let (status, _) = server.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
