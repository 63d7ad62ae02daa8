//! OAuth 2.0 Token Introspection Validator (RFC 7662)
//!
//! Asks an authorization server whether an opaque or JWT access token is
//! active. The server's answer is authoritative; the validator only checks
//! that it is consistent with the provider's configured expectations.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use federa_core::{IdentityProviderConfig, VerifiedFields};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{build_client, check_ca_pem, check_url};
use crate::config::{parse_provider_config, require};
use crate::error::{BridgeError, Result};
use crate::registry::ValidatorRegistry;
use crate::validator::Validator;

/// Type tag of the introspection validator
pub const TYPE: &str = "introspection";

pub const TOKEN_SUBJECT: &str = "token.subject";
pub const TOKEN_USERNAME: &str = "token.username";
pub const TOKEN_CLIENT_ID: &str = "token.client_id";
pub const TOKEN_ISSUER: &str = "token.issuer";
pub const TOKEN_SCOPE: &str = "token.scope";

const TOKEN_FIELDS: [&str; 5] = [
    TOKEN_SUBJECT,
    TOKEN_USERNAME,
    TOKEN_CLIENT_ID,
    TOKEN_ISSUER,
    TOKEN_SCOPE,
];

/// Prefix of fields copied from configured response claims
pub const CLAIM_PREFIX: &str = "claims.";

/// Configuration of an `introspection` provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntrospectionConfig {
    /// Introspection endpoint
    pub introspection_url: String,

    /// Client credentials used to authenticate to the endpoint
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,

    /// PEM CA to trust instead of the built-in roots
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// Required `iss` value, if any
    #[serde(default)]
    pub issuer: Option<String>,

    /// Audience that must appear in `aud`, if any
    #[serde(default)]
    pub audience: Option<String>,

    /// Extra response members exposed as `claims.<name>`
    #[serde(default)]
    pub claim_fields: Vec<String>,
}

/// RFC 7662 response members we care about
#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    #[serde(default)]
    active: bool,
    sub: Option<String>,
    username: Option<String>,
    client_id: Option<String>,
    iss: Option<String>,
    /// Either a string or an array of strings
    aud: Option<Value>,
    exp: Option<i64>,
    scope: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl IntrospectionResponse {
    fn has_audience(&self, audience: &str) -> bool {
        match &self.aud {
            Some(Value::String(aud)) => aud == audience,
            Some(Value::Array(auds)) => auds.iter().any(|a| a.as_str() == Some(audience)),
            _ => false,
        }
    }
}

fn is_claim_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Flatten a claim value to the string form used in field maps
fn claim_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Validator backed by an RFC 7662 introspection endpoint
pub struct IntrospectionValidator {
    name: String,
    config: IntrospectionConfig,
    client: reqwest::Client,
}

impl IntrospectionValidator {
    /// Build a validator from an `introspection` provider record
    pub fn new(config: &IdentityProviderConfig) -> Result<Self> {
        let provider = config.name.as_str();
        let parsed: IntrospectionConfig = parse_provider_config(config)?;

        require(provider, "introspection_url", &parsed.introspection_url)?;
        check_url(provider, "introspection_url", &parsed.introspection_url)?;
        require(provider, "client_id", &parsed.client_id)?;

        if let Some(pem) = parsed.ca_cert.as_deref() {
            check_ca_pem(provider, pem)?;
        }
        if let Some(bad) = parsed.claim_fields.iter().find(|c| !is_claim_name(c)) {
            return Err(BridgeError::invalid_config(
                provider,
                format!("claim_fields entry {:?} is not a valid field name", bad),
            ));
        }

        let client = build_client(provider, parsed.ca_cert.as_deref())?;

        Ok(Self {
            name: config.name.clone(),
            config: parsed,
            client,
        })
    }

    async fn introspect(&self, token: &str) -> Result<IntrospectionResponse> {
        let response = self
            .client
            .post(&self.config.introspection_url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("token", token), ("token_type_hint", "access_token")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::VerificationFailed(format!(
                "introspection returned HTTP {}",
                status
            )));
        }

        Ok(serde_json::from_slice(&response.bytes().await?)?)
    }

    fn check_response(&self, response: &IntrospectionResponse) -> Result<()> {
        if !response.active {
            return Err(BridgeError::VerificationFailed("token is not active".into()));
        }

        if let Some(expected) = self.config.issuer.as_deref() {
            if response.iss.as_deref() != Some(expected) {
                return Err(BridgeError::IdentityMismatch(format!(
                    "issuer {:?} does not match expected {:?}",
                    response.iss.as_deref().unwrap_or(""),
                    expected
                )));
            }
        }

        if let Some(audience) = self.config.audience.as_deref() {
            if !response.has_audience(audience) {
                return Err(BridgeError::IdentityMismatch(format!(
                    "token is not intended for audience {:?}",
                    audience
                )));
            }
        }

        // An active token that is already past its expiry is inconsistent.
        if let Some(exp) = response.exp {
            if exp <= Utc::now().timestamp() {
                let at = Utc
                    .timestamp_opt(exp, 0)
                    .single()
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| exp.to_string());
                return Err(BridgeError::Expired(at));
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for IntrospectionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionValidator")
            .field("name", &self.name)
            .field("introspection_url", &self.config.introspection_url)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Validator for IntrospectionValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "OAuth 2.0 token introspection validator"
    }

    async fn validate_login(&self, token: &str) -> Result<VerifiedFields> {
        if token.trim().is_empty() {
            return Err(BridgeError::InvalidToken("login token is empty".into()));
        }

        let response = self.introspect(token).await?;
        self.check_response(&response)?;

        let subject = response
            .sub
            .clone()
            .ok_or_else(|| BridgeError::MissingClaim("sub".into()))?;

        let mut fields = VerifiedFields::new();
        fields.insert(TOKEN_SUBJECT.to_string(), subject);
        for (field, value) in [
            (TOKEN_USERNAME, &response.username),
            (TOKEN_CLIENT_ID, &response.client_id),
            (TOKEN_ISSUER, &response.iss),
            (TOKEN_SCOPE, &response.scope),
        ] {
            if let Some(value) = value {
                fields.insert(field.to_string(), value.clone());
            }
        }
        for claim in &self.config.claim_fields {
            if let Some(value) = response.extra.get(claim).and_then(claim_string) {
                fields.insert(format!("{}{}", CLAIM_PREFIX, claim), value);
            }
        }

        debug!(provider = %self.name, fields = fields.len(), "Token introspection succeeded");
        Ok(fields)
    }

    fn available_fields(&self) -> Vec<String> {
        TOKEN_FIELDS
            .iter()
            .map(|f| f.to_string())
            .chain(
                self.config
                    .claim_fields
                    .iter()
                    .map(|c| format!("{}{}", CLAIM_PREFIX, c)),
            )
            .collect()
    }
}

/// Register the `introspection` type
pub fn register(registry: &ValidatorRegistry) {
    registry.register(TYPE, |config: &IdentityProviderConfig| {
        Ok(Arc::new(IntrospectionValidator::new(config)?) as Arc<dyn Validator>)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator(config: Value) -> Result<IntrospectionValidator> {
        IntrospectionValidator::new(&IdentityProviderConfig::new("oauth", TYPE).with_config(config))
    }

    fn base() -> Value {
        json!({
            "introspection_url": "https://auth.example.com/oauth2/introspect",
            "client_id": "federa",
            "client_secret": "s3cret",
            "issuer": "https://auth.example.com",
            "audience": "federa",
            "claim_fields": ["team", "email_verified"]
        })
    }

    fn response(value: Value) -> IntrospectionResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_validator() {
        assert!(validator(base()).is_ok());
        assert!(validator(json!({"introspection_url": "https://a/i", "client_id": "c"})).is_ok());

        let mut extra = base();
        extra["extra"] = json!(1);
        assert!(validator(extra).is_err());

        let mut bad_url = base();
        bad_url["introspection_url"] = json!("not a url");
        assert!(validator(bad_url).is_err());

        let mut no_client = base();
        no_client["client_id"] = json!("");
        assert!(validator(no_client).is_err());

        let mut bad_claim = base();
        bad_claim["claim_fields"] = json!(["ok", "has.dot"]);
        assert!(validator(bad_claim).is_err());

        let mut bad_ca = base();
        bad_ca["ca_cert"] = json!("invalid");
        assert!(validator(bad_ca).is_err());
    }

    #[test]
    fn test_available_fields() {
        let v = validator(base()).unwrap();
        assert_eq!(
            v.available_fields(),
            vec![
                "token.subject",
                "token.username",
                "token.client_id",
                "token.issuer",
                "token.scope",
                "claims.team",
                "claims.email_verified"
            ]
        );
    }

    #[test]
    fn test_check_response() {
        let v = validator(base()).unwrap();
        let future = Utc::now().timestamp() + 3600;

        assert!(v
            .check_response(&response(json!({
                "active": true, "sub": "u1", "iss": "https://auth.example.com",
                "aud": ["other", "federa"], "exp": future
            })))
            .is_ok());

        assert!(matches!(
            v.check_response(&response(json!({"active": false}))),
            Err(BridgeError::VerificationFailed(_))
        ));
        assert!(matches!(
            v.check_response(&response(json!({
                "active": true, "iss": "https://evil.example.com", "aud": "federa"
            }))),
            Err(BridgeError::IdentityMismatch(_))
        ));
        assert!(matches!(
            v.check_response(&response(json!({
                "active": true, "iss": "https://auth.example.com", "aud": "other"
            }))),
            Err(BridgeError::IdentityMismatch(_))
        ));
        assert!(matches!(
            v.check_response(&response(json!({
                "active": true, "iss": "https://auth.example.com", "aud": "federa", "exp": 1
            }))),
            Err(BridgeError::Expired(_))
        ));
    }

    #[test]
    fn test_claim_string() {
        assert_eq!(claim_string(&json!("a")), Some("a".into()));
        assert_eq!(claim_string(&json!(true)), Some("true".into()));
        assert_eq!(claim_string(&json!(42)), Some("42".into()));
        assert_eq!(claim_string(&json!({"nested": 1})), None);
    }
}
