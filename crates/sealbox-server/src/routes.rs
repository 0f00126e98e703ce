//! HTTP route definitions

use crate::{AppState, handlers, middleware};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main router
pub fn create_router(state: Arc<AppState>) -> Router {
    let rate_limiter = middleware::create_rate_limiter(state.config.rate_limit_rps);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Register, login, and named-key lookup work without a session
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/keys/{researcher_id}", get(handlers::lookup_public_key));

    let protected = Router::new()
        // Identity & key registry
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/session", get(handlers::session))
        .route("/api/keys", put(handlers::set_public_key))
        .route("/api/identities", get(handlers::search_identities))
        // Blob store
        .route("/api/files", post(handlers::upload_file))
        .route("/api/files", get(handlers::list_files))
        .route("/api/files/{file_id}", get(handlers::file_metadata))
        .route("/api/files/{file_id}", delete(handlers::delete_file))
        .route("/api/files/{file_id}/blob", get(handlers::download_blob))
        // Share ledger
        .route("/api/shares", post(handlers::create_share))
        .route("/api/shares/code/{code}", get(handlers::fetch_by_code))
        .route("/api/shares/outgoing", get(handlers::list_outgoing))
        .route("/api/shares/incoming", get(handlers::list_incoming))
        .route("/api/shares/{share_id}", delete(handlers::revoke_share))
        // Groups
        .route("/api/groups", post(handlers::create_group))
        .route("/api/groups", get(handlers::list_groups))
        .route("/api/groups/{group_id}/members", post(handlers::add_member))
        .route(
            "/api/groups/{group_id}/members/{researcher_id}",
            delete(handlers::remove_member),
        )
        .route("/api/groups/{group_id}/keys", get(handlers::list_member_keys))
        .route("/api/groups/{group_id}/shares", post(handlers::create_group_share))
        .route("/api/groups/{group_id}/shares", get(handlers::list_group_shares))
        .layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state),
            middleware::auth_middleware,
        ));

    public
        .merge(protected)
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(axum_middleware::from_fn_with_state(
            rate_limiter,
            middleware::rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .with_state(state)
}

/// GET /health
async fn health_check() -> &'static str {
    "ok"
}
