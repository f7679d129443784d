//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/auth/whoami", get(handlers::whoami))
        .route("/v1/admin/users", get(handlers::list_admin_users))
        // Storage element catalog
        .route(
            "/v1/storage-elements",
            post(handlers::register_storage_element).get(handlers::list_storage_elements),
        )
        .route(
            "/v1/storage-elements/{element_id}",
            get(handlers::get_storage_element)
                .put(handlers::update_storage_element)
                .delete(handlers::delete_storage_element),
        )
        .route(
            "/v1/storage-elements/{element_id}/sync",
            post(handlers::sync_storage_element),
        )
        .route(
            "/v1/storage-elements/{element_id}/files/sync",
            post(handlers::sync_storage_element_files),
        )
        // File registry
        .route(
            "/v1/files",
            get(handlers::list_files).post(handlers::register_file),
        )
        .route(
            "/v1/files/{file_id}",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/v1/files/{file_id}/restore", post(handlers::restore_file))
        // Service accounts
        .route(
            "/v1/service-accounts",
            get(handlers::list_service_accounts).post(handlers::create_service_account),
        )
        .route(
            "/v1/service-accounts/{account_id}",
            get(handlers::get_service_account)
                .put(handlers::update_service_account)
                .delete(handlers::delete_service_account),
        )
        .route(
            "/v1/service-accounts/{account_id}/rotate-secret",
            post(handlers::rotate_service_account_secret),
        )
        // Role overrides
        .route(
            "/v1/role-overrides",
            get(handlers::list_role_overrides).post(handlers::create_role_override),
        )
        .route(
            "/v1/role-overrides/{subject_id}",
            get(handlers::get_role_override)
                .put(handlers::update_role_override)
                .delete(handlers::delete_role_override),
        )
        // Identity provider and sync observability
        .route("/v1/idp/status", get(handlers::get_idp_status))
        .route("/v1/idp/sync", post(handlers::sync_idp))
        .route("/v1/sync/state", get(handlers::get_sync_state))
        .route("/v1/sync/runs", get(handlers::list_sync_runs));

    let mut router = Router::new().merge(api_routes);

    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
