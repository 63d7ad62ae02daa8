//! API module for the federa server

pub mod error;
pub mod handlers;

use axum::{
    extract::State,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Readiness check response
#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub provider_types: Vec<String>,
    pub provider_count: usize,
    pub cached_validators: usize,
}

/// Health check endpoint
///
/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}

/// Readiness check endpoint
///
/// GET /ready
pub async fn ready(State(state): State<Arc<AppState>>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        ready: true,
        provider_types: state.registry.types(),
        provider_count: state.store.list_providers().len(),
        cached_validators: state.cache().len(),
    })
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health))
        .route("/ready", get(ready))
        // Login
        .route("/v1/acl/login", post(handlers::login))
        // Admin endpoints
        .route("/v1/acl/idp-types", get(handlers::list_idp_types))
        .route("/v1/acl/idp", put(handlers::put_idp))
        .route("/v1/acl/idp/{name}", delete(handlers::delete_idp))
        .route("/v1/acl/binding-rule", post(handlers::create_binding_rule))
        .route(
            "/v1/acl/binding-rule/{id}",
            delete(handlers::delete_binding_rule),
        )
        .route("/v1/acl/validators/purge", post(handlers::purge_validators))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
