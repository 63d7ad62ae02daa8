//! Admin Handlers
//!
//! Write side of the identity provider and binding rule configuration.
//! Every write is checked before it is stored: a provider must yield a
//! working validator and a rule must fit its provider's fields.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use federa_core::{BindingRule, IdentityProviderConfig};
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IdpTypesResponse {
    pub types: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PutIdpResponse {
    pub name: String,
    pub modify_index: u64,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

/// List registered provider types
///
/// GET /v1/acl/idp-types
pub async fn list_idp_types(State(state): State<Arc<AppState>>) -> Json<IdpTypesResponse> {
    Json(IdpTypesResponse {
        types: state.registry.types(),
    })
}

/// Create or replace an identity provider
///
/// PUT /v1/acl/idp
pub async fn put_idp(
    State(state): State<Arc<AppState>>,
    Json(config): Json<IdentityProviderConfig>,
) -> Result<Json<PutIdpResponse>, ApiError> {
    let name = config.name.clone();
    let modify_index = state.upsert_provider(config)?;
    Ok(Json(PutIdpResponse { name, modify_index }))
}

/// Delete an identity provider and its binding rules
///
/// DELETE /v1/acl/idp/{name}
pub async fn delete_idp(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_provider(&name) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("identity provider {}", name)))
    }
}

/// Create a binding rule
///
/// POST /v1/acl/binding-rule
pub async fn create_binding_rule(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<BindingRule>,
) -> Result<Json<BindingRule>, ApiError> {
    let stored = state.create_binding_rule(rule).await?;
    Ok(Json(stored))
}

/// Delete a binding rule
///
/// DELETE /v1/acl/binding-rule/{id}
pub async fn delete_binding_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_binding_rule(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("binding rule {}", id)))
    }
}

/// Drop every cached validator
///
/// POST /v1/acl/validators/purge
pub async fn purge_validators(State(state): State<Arc<AppState>>) -> Json<PurgeResponse> {
    let purged = state.cache().len();
    state.cache().purge();
    Json(PurgeResponse { purged })
}
