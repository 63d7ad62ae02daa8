//! Shared application state and the write paths behind the admin API

use federa_bridge::{
    BindingEvaluator, BridgeError, LoginService, MemoryStore, ProviderStore, Result,
    ValidatorCache, ValidatorRegistry,
};
use federa_core::{BindType, BindingRule, IdentityProviderConfig};
use std::sync::Arc;
use tracing::info;

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Validator constructors by provider type
    pub registry: Arc<ValidatorRegistry>,
    /// Provider, rule and role storage
    pub store: Arc<MemoryStore>,
    /// Login flow over `store`, sharing the validator cache
    pub login: LoginService,
}

impl AppState {
    /// Wire a login service over a fresh in-memory store
    pub fn new(registry: ValidatorRegistry) -> Self {
        let registry = Arc::new(registry);
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(ValidatorCache::new(registry.clone()));
        let binder = BindingEvaluator::new(store.clone()).with_role_catalog(store.clone());
        let login = LoginService::new(store.clone(), cache, binder);

        Self {
            registry,
            store,
            login,
        }
    }

    pub fn cache(&self) -> &ValidatorCache {
        self.login.cache()
    }

    /// Store a provider after proving a validator can be built from it
    ///
    /// Returns the provider's new modify index.
    pub fn upsert_provider(&self, config: IdentityProviderConfig) -> Result<u64> {
        if config.name.trim().is_empty() {
            return Err(BridgeError::InvalidConfig {
                provider: config.name,
                reason: "name is required".into(),
            });
        }

        self.registry.create(&config)?;
        Ok(self.store.upsert_provider(config))
    }

    /// Store a binding rule after checking it against its provider
    pub async fn create_binding_rule(&self, rule: BindingRule) -> Result<BindingRule> {
        if let BindType::Other(other) = &rule.bind_type {
            return Err(BridgeError::InvalidRule(format!(
                "unknown bind type {:?}",
                other
            )));
        }

        let (index, config) = self
            .store
            .get_provider(&rule.provider)
            .await?
            .ok_or_else(|| BridgeError::ProviderNotFound(rule.provider.clone()))?;
        let validator = self.cache().load(index, &config)?;
        BindingEvaluator::check_rule(&rule, validator.as_ref())?;

        Ok(self.store.create_binding_rule(rule))
    }

    /// Add a role usable by `existing` role rules
    pub fn add_role(&self, name: &str) -> Result<()> {
        federa_core::validate_role_name(name)
            .map_err(|e| BridgeError::InvalidRule(e.to_string()))?;
        self.store.add_role(name);
        info!(role = %name, "Stored role");
        Ok(())
    }
}
