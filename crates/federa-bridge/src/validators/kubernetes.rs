//! Kubernetes Service Account Validator
//!
//! Verifies service account JWTs by asking the cluster's TokenReview API,
//! then resolves the reviewed account and applies the service name
//! annotation override.
//!
//! ## Login steps
//!
//! 1. The token must be a structurally valid JWT.
//! 2. The service account claims are read from the token without signature
//!    verification. Only used for the consistency check below.
//! 3. TokenReview is asked to authenticate the token.
//! 4. The reviewed username must be `system:serviceaccount:<ns>:<name>` and
//!    must agree with the claims (namespace, name and uid).
//! 5. The service account object is fetched; the
//!    [`SERVICE_NAME_ANNOTATION`] annotation, when set, replaces the name.

use async_trait::async_trait;
use federa_core::{IdentityProviderConfig, VerifiedFields};
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{build_client, check_ca_pem, check_url};
use crate::config::{parse_provider_config, require};
use crate::error::{BridgeError, Result};
use crate::registry::ValidatorRegistry;
use crate::validator::Validator;

/// Type tag of the Kubernetes validator
pub const TYPE: &str = "kubernetes";

pub const SA_NAMESPACE: &str = "serviceaccount.namespace";
pub const SA_NAME: &str = "serviceaccount.name";
pub const SA_UID: &str = "serviceaccount.uid";

/// Fields a service account login produces, in declaration order
pub const SERVICE_ACCOUNT_FIELDS: [&str; 3] = [SA_NAMESPACE, SA_NAME, SA_UID];

/// Service account annotation overriding the reported account name
pub const SERVICE_NAME_ANNOTATION: &str = "federa.io/service-name";

const TOKEN_REVIEW_PATH: &str = "/apis/authentication.k8s.io/v1/tokenreviews";

/// Configuration of a `kubernetes` provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubernetesConfig {
    /// API server address, e.g. `https://192.168.99.100:8443`
    pub host: String,

    /// PEM encoded CA certificate(s) the API server is signed with
    pub ca_cert: String,

    /// Reviewer token; must be allowed to create TokenReviews and read
    /// ServiceAccounts
    pub service_account_jwt: String,
}

// ----------------------------------------------------------------------------
// Token claims
// ----------------------------------------------------------------------------

/// Service account claims in both the legacy secret-token layout and the
/// projected-token layout
#[derive(Debug, Default, Deserialize)]
struct ServiceAccountClaims {
    #[serde(rename = "kubernetes.io/serviceaccount/namespace")]
    legacy_namespace: Option<String>,
    #[serde(rename = "kubernetes.io/serviceaccount/service-account.name")]
    legacy_name: Option<String>,
    #[serde(rename = "kubernetes.io/serviceaccount/service-account.uid")]
    legacy_uid: Option<String>,
    #[serde(rename = "kubernetes.io")]
    projected: Option<ProjectedClaims>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectedClaims {
    namespace: Option<String>,
    serviceaccount: Option<ProjectedAccount>,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectedAccount {
    name: Option<String>,
    uid: Option<String>,
}

/// Service account the token claims to be
#[derive(Debug, PartialEq, Eq)]
struct ClaimedAccount {
    namespace: String,
    name: String,
    uid: Option<String>,
}

impl ServiceAccountClaims {
    fn into_account(self) -> Result<ClaimedAccount> {
        let (namespace, name, uid) = match self.projected {
            Some(projected) => {
                let account = projected.serviceaccount.unwrap_or_default();
                (projected.namespace, account.name, account.uid)
            }
            None => (self.legacy_namespace, self.legacy_name, self.legacy_uid),
        };

        Ok(ClaimedAccount {
            namespace: namespace
                .ok_or_else(|| BridgeError::MissingClaim("service account namespace".into()))?,
            name: name.ok_or_else(|| BridgeError::MissingClaim("service account name".into()))?,
            uid,
        })
    }
}

/// Read the service account claims without verifying the signature
fn unverified_claims(token: &str) -> Result<ClaimedAccount> {
    let header = decode_header(token)
        .map_err(|e| BridgeError::InvalidToken(format!("not a valid JWT: {}", e)))?;

    let mut validation = Validation::new(header.alg);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;

    let data = decode::<ServiceAccountClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .map_err(|e| BridgeError::InvalidToken(format!("not a valid JWT: {}", e)))?;

    data.claims.into_account()
}

// ----------------------------------------------------------------------------
// API shapes
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenReview {
    #[serde(default)]
    status: TokenReviewStatus,
}

#[derive(Debug, Default, Deserialize)]
struct TokenReviewStatus {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    user: TokenReviewUser,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Default, Deserialize)]
struct TokenReviewUser {
    #[serde(default)]
    username: String,
    #[serde(default)]
    uid: String,
}

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    #[serde(default)]
    metadata: ObjectMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectMeta {
    #[serde(default)]
    annotations: HashMap<String, String>,
}

/// Split `system:serviceaccount:<ns>:<name>` into namespace and name
fn parse_username(username: &str) -> Result<(&str, &str)> {
    let parts: Vec<&str> = username.split(':').collect();
    if parts.len() != 4 {
        return Err(BridgeError::VerificationFailed(
            "lookup failed: unexpected username format".into(),
        ));
    }
    if parts[0] != "system" || parts[1] != "serviceaccount" {
        return Err(BridgeError::VerificationFailed(
            "lookup failed: username returned is not a service account".into(),
        ));
    }
    Ok((parts[2], parts[3]))
}

// ----------------------------------------------------------------------------
// Validator
// ----------------------------------------------------------------------------

/// Validator for Kubernetes service account tokens
pub struct KubernetesValidator {
    name: String,
    host: String,
    reviewer_jwt: String,
    client: reqwest::Client,
}

impl KubernetesValidator {
    /// Build a validator from a `kubernetes` provider record
    ///
    /// Fails when a setting is missing or malformed, or when the HTTP client
    /// cannot be configured with the CA certificate.
    pub fn new(config: &IdentityProviderConfig) -> Result<Self> {
        let provider = config.name.as_str();
        if config.provider_type != TYPE {
            return Err(BridgeError::invalid_config(
                provider,
                format!("{:?} is not a kubernetes identity provider", config.provider_type),
            ));
        }

        let parsed: KubernetesConfig = parse_provider_config(config)?;

        require(provider, "host", &parsed.host)?;
        check_url(provider, "host", &parsed.host)?;

        require(provider, "ca_cert", &parsed.ca_cert)?;
        check_ca_pem(provider, &parsed.ca_cert)?;

        require(provider, "service_account_jwt", &parsed.service_account_jwt)?;
        decode_header(&parsed.service_account_jwt).map_err(|e| {
            BridgeError::invalid_config(
                provider,
                format!("service_account_jwt is not a valid JWT: {}", e),
            )
        })?;

        let client = build_client(provider, Some(&parsed.ca_cert))?;

        Ok(Self {
            name: config.name.clone(),
            host: parsed.host.trim_end_matches('/').to_string(),
            reviewer_jwt: parsed.service_account_jwt,
            client,
        })
    }

    async fn review_token(&self, token: &str) -> Result<TokenReviewStatus> {
        let body = serde_json::json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenReview",
            "spec": { "token": token },
        });

        let response = self
            .client
            .post(format!("{}{}", self.host, TOKEN_REVIEW_PATH))
            .bearer_auth(&self.reviewer_jwt)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::VerificationFailed(format!(
                "token review returned HTTP {}",
                status
            )));
        }

        let review: TokenReview = serde_json::from_slice(&response.bytes().await?)?;
        Ok(review.status)
    }

    async fn service_account_annotations(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<HashMap<String, String>> {
        for part in [namespace, name] {
            if !is_object_name(part) {
                return Err(BridgeError::VerificationFailed(format!(
                    "invalid service account name {:?}",
                    part
                )));
            }
        }
        let url = format!(
            "{}/api/v1/namespaces/{}/serviceaccounts/{}",
            self.host, namespace, name
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.reviewer_jwt)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::VerificationFailed(format!(
                "annotation lookup failed: HTTP {}",
                status
            )));
        }

        let account: ServiceAccount = serde_json::from_slice(&response.bytes().await?)?;
        Ok(account.metadata.annotations)
    }
}

/// A DNS-subdomain object name, safe as a single URL path segment
fn is_object_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 253
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
}

impl std::fmt::Debug for KubernetesValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesValidator")
            .field("name", &self.name)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Validator for KubernetesValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "kubernetes service account validator"
    }

    async fn validate_login(&self, token: &str) -> Result<VerifiedFields> {
        let claimed = unverified_claims(token)?;

        let review = self.review_token(token).await?;
        if !review.error.is_empty() {
            return Err(BridgeError::VerificationFailed(format!(
                "lookup failed: {}",
                review.error
            )));
        }
        if !review.authenticated {
            return Err(BridgeError::VerificationFailed(
                "lookup failed: service account jwt not valid".into(),
            ));
        }

        let (namespace, account) = parse_username(&review.user.username)?;
        let uid = review.user.uid.as_str();

        if claimed.namespace != namespace || claimed.name != account {
            warn!(
                provider = %self.name,
                claimed = %format!("{}/{}", claimed.namespace, claimed.name),
                reviewed = %format!("{}/{}", namespace, account),
                "Token claims disagree with token review"
            );
            return Err(BridgeError::IdentityMismatch(
                "service account in token does not match token review".into(),
            ));
        }
        if let Some(claimed_uid) = claimed.uid.as_deref() {
            if claimed_uid != uid {
                return Err(BridgeError::IdentityMismatch(
                    "service account uid in token does not match token review".into(),
                ));
            }
        }

        let annotations = self.service_account_annotations(namespace, account).await?;
        let name = match annotations.get(SERVICE_NAME_ANNOTATION) {
            Some(override_name) => {
                debug!(
                    provider = %self.name,
                    account = %account,
                    service = %override_name,
                    "Applying service name annotation"
                );
                override_name.as_str()
            }
            None => account,
        };

        let mut fields = VerifiedFields::new();
        fields.insert(SA_NAMESPACE.to_string(), namespace.to_string());
        fields.insert(SA_NAME.to_string(), name.to_string());
        fields.insert(SA_UID.to_string(), uid.to_string());
        Ok(fields)
    }

    fn available_fields(&self) -> Vec<String> {
        SERVICE_ACCOUNT_FIELDS.iter().map(|f| f.to_string()).collect()
    }
}

/// Register the `kubernetes` type
pub fn register(registry: &ValidatorRegistry) {
    registry.register(TYPE, |config: &IdentityProviderConfig| {
        Ok(Arc::new(KubernetesValidator::new(config)?) as Arc<dyn Validator>)
    });
}
