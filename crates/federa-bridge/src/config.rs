//! Strict decoding of provider configuration blobs

use federa_core::IdentityProviderConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Decode a provider's opaque config into a typed configuration
///
/// Target types are expected to carry `#[serde(deny_unknown_fields)]` so a
/// misspelled key is a construction error instead of a silently ignored
/// setting. A `null` config decodes as an empty object.
pub fn parse_config<T: DeserializeOwned>(provider: &str, config: &Value) -> Result<T> {
    let value = match config {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| BridgeError::invalid_config(provider, e))
}

/// [`parse_config`] over a whole provider record
pub fn parse_provider_config<T: DeserializeOwned>(config: &IdentityProviderConfig) -> Result<T> {
    parse_config(&config.name, &config.config)
}

/// Fail with `InvalidConfig` when a required string setting is blank
pub(crate) fn require(provider: &str, key: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BridgeError::invalid_config(provider, format!("{} is required", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(deny_unknown_fields)]
    struct Sample {
        host: String,
        #[serde(default)]
        retries: u32,
    }

    #[test]
    fn test_parse_config() {
        let sample: Sample = parse_config("idp", &json!({"host": "https://k8s:8443"})).unwrap();
        assert_eq!(
            sample,
            Sample {
                host: "https://k8s:8443".into(),
                retries: 0
            }
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = parse_config::<Sample>("idp", &json!({"host": "h", "extra": "config"}))
            .unwrap_err();
        match err {
            BridgeError::InvalidConfig { provider, reason } => {
                assert_eq!(provider, "idp");
                assert!(reason.contains("extra"));
            }
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_value_type_rejected() {
        assert!(parse_config::<Sample>("idp", &json!({"host": [12345]})).is_err());
        assert!(parse_config::<Sample>("idp", &json!("host")).is_err());
    }

    #[test]
    fn test_null_is_empty_object() {
        #[derive(Debug, Deserialize, Default)]
        #[serde(deny_unknown_fields)]
        struct Optional {
            #[serde(default)]
            tokens: Vec<String>,
        }

        let parsed: Optional = parse_config("idp", &Value::Null).unwrap();
        assert!(parsed.tokens.is_empty());
        assert!(parse_config::<Sample>("idp", &Value::Null).is_err());
    }

    #[test]
    fn test_require() {
        assert!(require("idp", "host", "https://k8s").is_ok());
        assert!(require("idp", "host", "  ").is_err());
    }
}
