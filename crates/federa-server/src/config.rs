use anyhow::{Context, Result};
use federa_core::{BindingRule, IdentityProviderConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::state::AppState;

pub const DEFAULT_PORT: u16 = 8500;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Server configuration sourced from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub log_level: String,
    pub bootstrap_path: Option<PathBuf>,
    pub enable_testing_provider: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            bootstrap_path: None,
            enable_testing_provider: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = match lookup("FEDERA_PORT") {
            Some(value) => value.parse().with_context(|| "parse FEDERA_PORT")?,
            None => DEFAULT_PORT,
        };
        let log_level = lookup("FEDERA_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let bootstrap_path = lookup("FEDERA_BOOTSTRAP")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let enable_testing_provider = match lookup("FEDERA_ENABLE_TESTING_PROVIDER") {
            Some(value) => parse_flag(&value).with_context(|| "parse FEDERA_ENABLE_TESTING_PROVIDER")?,
            None => false,
        };

        Ok(Self {
            port,
            log_level,
            bootstrap_path,
            enable_testing_provider,
        })
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("expected a boolean, got {other:?}"),
    }
}

/// Startup seed data: providers, binding rules and roles
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bootstrap {
    #[serde(default)]
    pub providers: Vec<IdentityProviderConfig>,
    #[serde(default)]
    pub binding_rules: Vec<BindingRule>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Bootstrap {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read FEDERA_BOOTSTRAP: {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        serde_json::from_str(contents).with_context(|| "parse bootstrap json")
    }

    /// Load everything into `state` through the same checks the admin API applies
    pub async fn apply(self, state: &AppState) -> Result<()> {
        let (providers, rules, roles) =
            (self.providers.len(), self.binding_rules.len(), self.roles.len());

        for role in &self.roles {
            state
                .add_role(role)
                .with_context(|| format!("bootstrap role {role:?}"))?;
        }
        for provider in self.providers {
            let name = provider.name.clone();
            state
                .upsert_provider(provider)
                .with_context(|| format!("bootstrap provider {name:?}"))?;
        }
        for rule in self.binding_rules {
            let provider = rule.provider.clone();
            state
                .create_binding_rule(rule)
                .await
                .with_context(|| format!("bootstrap binding rule for {provider:?}"))?;
        }

        info!(providers, binding_rules = rules, roles, "Applied bootstrap data");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use federa_bridge::validators::testing;
    use federa_bridge::ValidatorRegistry;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8500);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("FEDERA_PORT", "9000"),
            ("FEDERA_LOG_LEVEL", "debug"),
            ("FEDERA_BOOTSTRAP", "/etc/federa/bootstrap.json"),
            ("FEDERA_ENABLE_TESTING_PROVIDER", "true"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.bootstrap_path,
            Some(PathBuf::from("/etc/federa/bootstrap.json"))
        );
        assert!(config.enable_testing_provider);
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServerConfig::from_lookup(lookup(&[("FEDERA_PORT", "http")])).is_err());
        assert!(
            ServerConfig::from_lookup(lookup(&[("FEDERA_ENABLE_TESTING_PROVIDER", "maybe")]))
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_bootstrap_apply() {
        let bootstrap = Bootstrap::parse(
            r#"{
                "providers": [
                    {"name": "minikube", "type": "testing", "config": {
                        "tokens": {"tok": {"namespace": "default", "name": "demo"}}
                    }}
                ],
                "binding_rules": [
                    {"provider": "minikube", "bind_type": "role",
                     "bind_name": "k8s-{{serviceaccount.name}}",
                     "selector": "serviceaccount.namespace==default",
                     "role_resolution": "existing"}
                ],
                "roles": ["k8s-demo"]
            }"#,
        )
        .unwrap();

        let registry = ValidatorRegistry::new();
        testing::register(&registry);
        let state = AppState::new(registry);
        bootstrap.apply(&state).await.unwrap();

        let outcome = state.login.login("minikube", "tok").await.unwrap();
        assert_eq!(outcome.grants.role_links()[0].name, "k8s-demo");
    }

    #[tokio::test]
    async fn test_bootstrap_rejects_bad_rule() {
        let bootstrap = Bootstrap::parse(
            r#"{"binding_rules": [{"provider": "missing", "bind_type": "role", "bind_name": "x"}]}"#,
        )
        .unwrap();

        let state = AppState::new(ValidatorRegistry::new());
        assert!(bootstrap.apply(&state).await.is_err());
    }

    #[test]
    fn test_bootstrap_unknown_keys() {
        assert!(Bootstrap::parse(r#"{"providers": [], "policies": []}"#).is_err());
    }
}
