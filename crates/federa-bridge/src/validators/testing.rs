//! Testing Validator
//!
//! Fixed token table for tests and local development. Exposes the same
//! fields as the Kubernetes validator so binding rules written against one
//! work unchanged against the other. Never part of
//! [`ValidatorRegistry::with_builtins`](crate::registry::ValidatorRegistry::with_builtins).

use async_trait::async_trait;
use federa_core::{IdentityProviderConfig, VerifiedFields};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::kubernetes::{SERVICE_ACCOUNT_FIELDS, SA_NAME, SA_NAMESPACE, SA_UID};
use crate::config::parse_provider_config;
use crate::error::{BridgeError, Result};
use crate::registry::ValidatorRegistry;
use crate::validator::Validator;

/// Type tag of the testing validator
pub const TYPE: &str = "testing";

/// Service account a test token resolves to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestingIdentity {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub uid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TestingConfig {
    #[serde(default)]
    tokens: HashMap<String, TestingIdentity>,
}

/// Validator that accepts a fixed set of tokens
#[derive(Debug, Clone)]
pub struct TestingValidator {
    name: String,
    tokens: HashMap<String, TestingIdentity>,
}

impl TestingValidator {
    /// Create a validator with no accepted tokens
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tokens: HashMap::new(),
        }
    }

    /// Build from a provider record; config is `{"tokens": {<token>: {namespace, name, uid}}}`
    pub fn from_config(config: &IdentityProviderConfig) -> Result<Self> {
        let parsed: TestingConfig = parse_provider_config(config)?;
        Ok(Self {
            name: config.name.clone(),
            tokens: parsed.tokens,
        })
    }

    /// Accept `token` as the given service account
    pub fn with_identity(
        mut self,
        token: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        uid: impl Into<String>,
    ) -> Self {
        self.tokens.insert(
            token.into(),
            TestingIdentity {
                namespace: namespace.into(),
                name: name.into(),
                uid: uid.into(),
            },
        );
        self
    }
}

#[async_trait]
impl Validator for TestingValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "testing validator"
    }

    async fn validate_login(&self, token: &str) -> Result<VerifiedFields> {
        if token.is_empty() {
            return Err(BridgeError::InvalidToken("login token is empty".into()));
        }

        let identity = self
            .tokens
            .get(token)
            .ok_or_else(|| BridgeError::VerificationFailed("unknown test token".into()))?;

        debug!(provider = %self.name, namespace = %identity.namespace, account = %identity.name, "Accepted test token");

        let mut fields = VerifiedFields::new();
        fields.insert(SA_NAMESPACE.to_string(), identity.namespace.clone());
        fields.insert(SA_NAME.to_string(), identity.name.clone());
        fields.insert(SA_UID.to_string(), identity.uid.clone());
        Ok(fields)
    }

    fn available_fields(&self) -> Vec<String> {
        SERVICE_ACCOUNT_FIELDS.iter().map(|f| f.to_string()).collect()
    }
}

/// Register the `testing` type
pub fn register(registry: &ValidatorRegistry) {
    registry.register(TYPE, |config: &IdentityProviderConfig| {
        Ok(Arc::new(TestingValidator::from_config(config)?) as Arc<dyn Validator>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_known_token() {
        let validator = TestingValidator::new("test-idp").with_identity(
            "tok-demo",
            "default",
            "demo",
            "76091af4-4b56-11e9-ac4b-708b11801cbe",
        );

        let fields = validator.validate_login("tok-demo").await.unwrap();
        assert_eq!(fields.get(SA_NAMESPACE).map(String::as_str), Some("default"));
        assert_eq!(fields.get(SA_NAME).map(String::as_str), Some("demo"));
        assert_eq!(fields.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_and_empty_tokens() {
        let validator = TestingValidator::new("test-idp");

        assert!(matches!(
            validator.validate_login("nope").await.unwrap_err(),
            BridgeError::VerificationFailed(_)
        ));
        assert!(matches!(
            validator.validate_login("").await.unwrap_err(),
            BridgeError::InvalidToken(_)
        ));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = IdentityProviderConfig::new("test-idp", TYPE).with_config(json!({
            "tokens": {
                "tok-a": {"namespace": "prod", "name": "api", "uid": "u-1"}
            }
        }));
        let validator = TestingValidator::from_config(&config).unwrap();

        let fields = validator.validate_login("tok-a").await.unwrap();
        assert_eq!(fields.get(SA_NAMESPACE).map(String::as_str), Some("prod"));
        assert_eq!(validator.name(), "test-idp");
    }

    #[test]
    fn test_from_config_rejects_unknown_keys() {
        let config = IdentityProviderConfig::new("test-idp", TYPE)
            .with_config(json!({"tokens": {}, "extra": true}));
        assert!(TestingValidator::from_config(&config).is_err());
    }

    #[test]
    fn test_registered_explicitly() {
        let registry = ValidatorRegistry::new();
        register(&registry);
        assert!(registry.is_registered(TYPE));
        assert!(!ValidatorRegistry::with_builtins().is_registered(TYPE));
    }
}
