//! Error types for the identity bridge

use thiserror::Error;

use crate::store::StoreError;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Broad category of a [`BridgeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised while constructing a validator, before any login is attempted
    Configuration,
    /// The login token is malformed, unverifiable or inconsistent
    Authentication,
    /// A matching rule produced an unusable grant; the login is denied
    RuleEvaluation,
    /// A config or rule store read failed; the caller may retry the login
    TransientStore,
}

/// Errors that can occur in the identity bridge
#[derive(Error, Debug)]
pub enum BridgeError {
    // ---- configuration ------------------------------------------------------
    /// No validator constructor registered for the provider's type tag
    #[error("Identity provider {provider:?} has unknown type {provider_type:?}")]
    UnknownProviderType {
        provider: String,
        provider_type: String,
    },

    /// Provider configuration is invalid or incomplete
    #[error("Invalid configuration for identity provider {provider:?}: {reason}")]
    InvalidConfig { provider: String, reason: String },

    /// No provider with this name exists in the config store
    #[error("Identity provider not found: {0}")]
    ProviderNotFound(String),

    // ---- authentication -----------------------------------------------------
    /// Login token is not well formed
    #[error("Invalid login token: {0}")]
    InvalidToken(String),

    /// The external authority rejected the token, or could not be asked
    #[error("Login verification failed: {0}")]
    VerificationFailed(String),

    /// Independently asserted identity attributes disagree
    #[error("Identity mismatch: {0}")]
    IdentityMismatch(String),

    /// A claim required to build the verified field map is missing
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    /// The token has expired
    #[error("Login token expired at {0}")]
    Expired(String),

    // ---- rule evaluation ----------------------------------------------------
    /// A bind-name template could not be parsed or resolved
    #[error("Binding rule {rule:?} cannot compute a {bind_type} bind name: {reason}")]
    BindNameUnresolved {
        rule: String,
        bind_type: String,
        reason: String,
    },

    /// The computed bind name violates the naming rules of its bind type
    #[error("Binding rule {rule:?} computed an invalid {bind_type} bind name: {name:?}")]
    InvalidBindName {
        rule: String,
        bind_type: String,
        name: String,
    },

    /// An `existing` role rule computed a name with no matching role
    #[error("Binding rule {rule:?} requires role {role:?}, which does not exist")]
    RoleNotFound { rule: String, role: String },

    /// An `existing` role rule was evaluated without a role catalog
    #[error("Binding rule {rule:?} requires an existing role but no role catalog is configured")]
    RoleCatalogUnavailable { rule: String },

    /// A rule is unusable for its provider (raised when rules are checked on write)
    #[error("Invalid binding rule: {0}")]
    InvalidRule(String),

    // ---- store --------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl BridgeError {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::UnknownProviderType { .. }
            | BridgeError::InvalidConfig { .. }
            | BridgeError::ProviderNotFound(_)
            | BridgeError::InvalidRule(_) => ErrorKind::Configuration,

            BridgeError::InvalidToken(_)
            | BridgeError::VerificationFailed(_)
            | BridgeError::IdentityMismatch(_)
            | BridgeError::MissingClaim(_)
            | BridgeError::Expired(_) => ErrorKind::Authentication,

            BridgeError::BindNameUnresolved { .. }
            | BridgeError::InvalidBindName { .. }
            | BridgeError::RoleNotFound { .. }
            | BridgeError::RoleCatalogUnavailable { .. } => ErrorKind::RuleEvaluation,

            BridgeError::Store(_) => ErrorKind::TransientStore,
        }
    }

    pub(crate) fn invalid_config(provider: &str, reason: impl std::fmt::Display) -> Self {
        BridgeError::InvalidConfig {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for BridgeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => BridgeError::Expired("JWT expired".into()),
            ErrorKind::InvalidSignature => BridgeError::VerificationFailed(err.to_string()),
            _ => BridgeError::InvalidToken(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        BridgeError::VerificationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::VerificationFailed(format!("unexpected response body: {}", err))
    }
}
