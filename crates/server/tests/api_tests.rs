//! Integration tests for authentication, authorization and the error envelope.

mod common;

use artstore_core::Role;
use artstore_metadata::models::RoleOverrideRow;
use artstore_metadata::repos::RoleOverrideRepo;
use artstore_server::auth::hash_token;
use axum::http::{Request, StatusCode};
use common::{ADMIN, READER, STRANGER, TestServer};
use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

#[tokio::test]
async fn test_health_needs_no_identity() {
    let server = TestServer::new().await;

    let (status, body) = server.request("GET", "/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_missing_subject_is_unauthorized() {
    let server = TestServer::new().await;

    let (status, body) = server
        .request("GET", "/v1/storage-elements", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_subject_without_role_is_forbidden() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/v1/storage-elements", STRANGER).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    // whoami still explains the caller's situation.
    let (status, body) = server.get("/v1/auth/whoami", STRANGER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["subject_id"], STRANGER.subject);
    assert!(body["role"].is_null());
}

#[tokio::test]
async fn test_readonly_can_read_but_not_mutate() {
    let server = TestServer::new().await;

    let (status, _) = server.get("/v1/storage-elements", READER).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post(
            "/v1/storage-elements",
            json!({ "name": "node-a", "base_url": "http://node-a:8010" }),
            READER,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, _) = server.post("/v1/idp/sync", json!({}), READER).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_group_paths_map_to_roles() {
    let server = TestServer::new().await;

    let (status, body) = server.get("/v1/auth/whoami", READER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_role"], "readonly");
    assert_eq!(body["role"], "readonly");
    assert_eq!(body["groups"], json!(["/artstore-viewers"]));

    let (_, body) = server.get("/v1/auth/whoami", ADMIN).await;
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn test_override_raises_but_never_lowers() {
    let server = TestServer::new().await;
    let now = OffsetDateTime::now_utc();

    for (subject, role) in [(STRANGER.subject, Role::Readonly), (ADMIN.subject, Role::Readonly)] {
        server
            .metadata()
            .create_role_override(&RoleOverrideRow {
                override_id: Uuid::new_v4(),
                subject_id: subject.to_string(),
                role: role.as_str().to_string(),
                created_by: "test".to_string(),
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let (_, body) = server.get("/v1/auth/whoami", STRANGER).await;
    assert_eq!(body["override_role"], "readonly");
    assert_eq!(body["role"], "readonly");
    let (status, _) = server.get("/v1/storage-elements", STRANGER).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server.get("/v1/auth/whoami", ADMIN).await;
    assert_eq!(body["override_role"], "readonly");
    assert_eq!(body["role"], "admin");
}

#[tokio::test]
async fn test_gateway_token_is_required_when_configured() {
    let server = TestServer::with_config(|config| {
        config.auth.gateway_token_hash = Some(hash_token("gateway-secret"));
    })
    .await;

    let (status, _) = server.get("/v1/storage-elements", ADMIN).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = |token: &str| {
        Request::builder()
            .method("GET")
            .uri("/v1/storage-elements")
            .header("X-Auth-Subject", ADMIN.subject)
            .header("X-Auth-Groups", ADMIN.groups)
            .header("X-Gateway-Token", token)
    };

    let (status, _) = server.send(request("wrong"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server.send(request("gateway-secret"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_error_envelope_codes() {
    let server = TestServer::new().await;

    let (status, body) = server
        .get(&format!("/v1/storage-elements/{}", Uuid::new_v4()), READER)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = server.get("/v1/files/not-a-uuid", READER).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, body) = server
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/role-overrides")
                .header("X-Auth-Subject", ADMIN.subject)
                .header("X-Auth-Groups", ADMIN.groups)
                .header("Content-Type", "application/json"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_metrics_endpoint_follows_config() {
    artstore_server::metrics::register_metrics();

    let server = TestServer::new().await;
    let (status, _) = server.request("GET", "/metrics", None, None).await;
    // Prometheus text is not JSON; only the status matters here.
    assert_eq!(status, StatusCode::OK);

    let server = TestServer::with_config(|config| config.server.metrics_enabled = false).await;
    let (status, _) = server.request("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_users_lists_mapped_and_effective_roles() {
    let server = TestServer::new().await;
    server.idp.add_user("u-1", "alice", &["artstore-admins"]);
    server.idp.add_user("u-2", "bob", &["unrelated"]);

    let now = OffsetDateTime::now_utc();
    server
        .metadata()
        .create_role_override(&RoleOverrideRow {
            override_id: Uuid::new_v4(),
            subject_id: "u-2".to_string(),
            role: "readonly".to_string(),
            created_by: "test".to_string(),
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

    let (status, body) = server.get("/v1/admin/users", READER).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "alice");
    assert_eq!(users[0]["group_role"], "admin");
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[1]["username"], "bob");
    assert!(users[1]["group_role"].is_null());
    assert_eq!(users[1]["override_role"], "readonly");
    assert_eq!(users[1]["role"], "readonly");
}

#[tokio::test]
async fn test_admin_users_without_identity_provider() {
    let server = TestServer::without_identity().await;

    let (status, body) = server.get("/v1/admin/users", READER).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "identity_provider_unavailable");
}

