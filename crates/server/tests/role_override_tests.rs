//! Integration tests for role overrides and bootstrap admins.

mod common;

use artstore_core::config::AuthConfig;
use artstore_server::bootstrap::{BOOTSTRAP_CREATOR, ensure_bootstrap_admins};
use axum::http::StatusCode;
use common::{ADMIN, READER, STRANGER, TestServer};
use serde_json::json;

#[tokio::test]
async fn test_role_override_crud() {
    let server = TestServer::new().await;
    let uri = format!("/v1/role-overrides/{}", STRANGER.subject);

    let (status, created) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": STRANGER.subject, "role": "readonly" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["subject_id"], STRANGER.subject);
    assert_eq!(created["role"], "readonly");
    assert_eq!(created["created_by"], ADMIN.subject);

    let (status, body) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": STRANGER.subject, "role": "admin" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, fetched) = server.get(&uri, READER).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["role"], "readonly");

    let (status, updated) = server.put(&uri, json!({ "role": "admin" }), ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["role"], "admin");

    let (_, list) = server.get("/v1/role-overrides", READER).await;
    assert_eq!(list["role_overrides"].as_array().unwrap().len(), 1);

    let (status, _) = server.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = server.get(&uri, READER).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = server.put(&uri, json!({ "role": "admin" }), ADMIN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_role_override_validation() {
    let server = TestServer::new().await;

    let (status, body) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": "  ", "role": "admin" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": "someone", "role": "superuser" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": "x".repeat(300), "role": "admin" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_override_grants_access_immediately() {
    let server = TestServer::new().await;

    let (status, _) = server
        .post("/v1/role-overrides", json!({ "subject_id": "svc", "role": "admin" }), STRANGER)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": STRANGER.subject, "role": "admin" }),
            ADMIN,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, whoami) = server.get("/v1/auth/whoami", STRANGER).await;
    assert!(whoami["group_role"].is_null());
    assert_eq!(whoami["override_role"], "admin");
    assert_eq!(whoami["role"], "admin");

    let (status, _) = server
        .post("/v1/role-overrides", json!({ "subject_id": "svc", "role": "readonly" }), STRANGER)
        .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_readonly_cannot_manage_overrides() {
    let server = TestServer::new().await;

    let (status, _) = server
        .post(
            "/v1/role-overrides",
            json!({ "subject_id": READER.subject, "role": "admin" }),
            READER,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = server.get("/v1/role-overrides", READER).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_bootstrap_admins_are_granted_once() {
    let server = TestServer::new().await;
    let metadata = server.metadata();
    let config = AuthConfig {
        bootstrap_admins: vec!["first-operator".to_string(), " second-operator ".to_string()],
        ..AuthConfig::default()
    };

    let created = ensure_bootstrap_admins(metadata.as_ref(), &config).await.unwrap();
    assert_eq!(created, 2);

    let (_, body) = server.get("/v1/role-overrides/second-operator", READER).await;
    assert_eq!(body["role"], "admin");
    assert_eq!(body["created_by"], BOOTSTRAP_CREATOR);

    // A later demotion survives a restart.
    let (status, _) = server
        .put("/v1/role-overrides/first-operator", json!({ "role": "readonly" }), ADMIN)
        .await;
    assert_eq!(status, StatusCode::OK);

    let created = ensure_bootstrap_admins(metadata.as_ref(), &config).await.unwrap();
    assert_eq!(created, 0);
    let (_, body) = server.get("/v1/role-overrides/first-operator", READER).await;
    assert_eq!(body["role"], "readonly");
}
