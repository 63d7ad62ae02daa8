//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use federa_bridge::{BridgeError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
            }
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        if let BridgeError::ProviderNotFound(_) = err {
            return ApiError::NotFound(err.to_string());
        }
        match err.kind() {
            ErrorKind::Configuration => ApiError::BadRequest(err.to_string()),
            ErrorKind::Authentication => ApiError::Unauthorized(err.to_string()),
            ErrorKind::RuleEvaluation => ApiError::Forbidden(err.to_string()),
            ErrorKind::TransientStore => ApiError::Unavailable(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use federa_bridge::StoreError;

    #[test]
    fn test_bridge_error_mapping() {
        let status = |err: BridgeError| ApiError::from(err).into_response().status();

        assert_eq!(
            status(BridgeError::ProviderNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(BridgeError::InvalidRule("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(BridgeError::InvalidToken("bad".into())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(BridgeError::RoleNotFound {
                rule: "r".into(),
                role: "k8s-demo".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(StoreError::Unavailable("no leader".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
