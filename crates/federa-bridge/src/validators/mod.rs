//! Built-in identity provider validators

pub mod introspection;
pub mod kubernetes;
pub mod testing;

pub use introspection::IntrospectionValidator;
pub use kubernetes::KubernetesValidator;
pub use testing::TestingValidator;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::{BridgeError, Result};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Check that `pem` holds at least one well-framed certificate block
///
/// The TLS stack silently ignores text that contains no certificate, so a
/// mangled CA would otherwise surface only as handshake failures at login.
pub(crate) fn check_ca_pem(provider: &str, pem: &str) -> Result<()> {
    let mut rest = pem;
    let mut blocks = 0;

    while let Some(start) = rest.find(PEM_BEGIN) {
        let body_start = start + PEM_BEGIN.len();
        let end = rest[body_start..].find(PEM_END).ok_or_else(|| {
            BridgeError::invalid_config(provider, "CA certificate block is not terminated")
        })?;
        let body: String = rest[body_start..body_start + end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        match STANDARD.decode(body.as_bytes()) {
            Ok(der) if !der.is_empty() => blocks += 1,
            _ => {
                return Err(BridgeError::invalid_config(
                    provider,
                    "CA certificate block is not valid base64",
                ))
            }
        }
        rest = &rest[body_start + end + PEM_END.len()..];
    }

    if blocks == 0 {
        return Err(BridgeError::invalid_config(
            provider,
            "CA certificate contains no PEM certificate",
        ));
    }
    Ok(())
}

/// Check that a configured endpoint is an absolute http(s) URL
pub(crate) fn check_url(provider: &str, key: &str, value: &str) -> Result<reqwest::Url> {
    let url = reqwest::Url::parse(value)
        .map_err(|e| BridgeError::invalid_config(provider, format!("{} is invalid: {}", key, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(BridgeError::invalid_config(
            provider,
            format!("{} must be an http or https URL", key),
        )),
    }
}

/// Build an HTTP client, trusting only `ca_pem` when one is given
pub(crate) fn build_client(provider: &str, ca_pem: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(pem) = ca_pem {
        let certificate = reqwest::Certificate::from_pem(pem.as_bytes())
            .map_err(|e| BridgeError::invalid_config(provider, e))?;
        builder = builder
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate);
    }
    builder
        .build()
        .map_err(|e| BridgeError::invalid_config(provider, e))
}
