//! Login Handler
//!
//! Exchanges a provider login token for the grants computed by the
//! provider's binding rules.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Request to log in through an identity provider
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Provider name
    pub provider: String,

    /// Login token issued by the provider
    pub token: String,
}

/// Grants for the new token
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub provider: String,

    /// Service identity names, in rule order
    pub service_identities: Vec<String>,

    /// Role names, in rule order
    pub roles: Vec<String>,
}

/// Log in with an external token
///
/// POST /v1/acl/login
///
/// A verified login that no binding rule grants anything to is refused.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let outcome = state.login.login(&request.provider, &request.token).await?;

    if outcome.grants.is_empty() {
        warn!(provider = %request.provider, "Login verified but no binding rule matched");
        return Err(ApiError::Forbidden(
            "No binding rules matched the login".into(),
        ));
    }

    Ok(Json(LoginResponse {
        provider: outcome.provider,
        service_identities: outcome
            .grants
            .service_identities()
            .into_iter()
            .map(|s| s.name.clone())
            .collect(),
        roles: outcome
            .grants
            .role_links()
            .into_iter()
            .map(|r| r.name.clone())
            .collect(),
    }))
}
