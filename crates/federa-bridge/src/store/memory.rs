//! In-memory store backend
//!
//! Stands in for the replicated configuration and rule store. Every
//! provider write bumps a single store-wide modify index, so indices are
//! monotonic for every provider name. Data is lost on restart.

use async_trait::async_trait;
use federa_core::{BindingRule, IdentityProviderConfig};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::{BindingRuleStore, ProviderStore, RoleCatalog, StoreError};

#[derive(Debug, Default)]
struct Providers {
    by_name: HashMap<String, IdentityProviderConfig>,
    last_index: u64,
}

/// In-memory provider, rule and role store
#[derive(Debug, Default)]
pub struct MemoryStore {
    providers: RwLock<Providers>,
    rules: RwLock<Vec<BindingRule>>,
    roles: RwLock<BTreeSet<String>>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Providers
    // =========================================================================

    /// Insert or replace a provider, returning its new modify index
    pub fn upsert_provider(&self, mut config: IdentityProviderConfig) -> u64 {
        let mut providers = self.providers.write();
        providers.last_index += 1;
        let index = providers.last_index;
        config.modify_index = index;
        info!(
            provider = %config.name,
            provider_type = %config.provider_type,
            modify_index = index,
            "Stored identity provider"
        );
        providers.by_name.insert(config.name.clone(), config);
        index
    }

    /// Delete a provider and every binding rule attached to it
    pub fn delete_provider(&self, name: &str) -> bool {
        let removed = {
            let mut providers = self.providers.write();
            let removed = providers.by_name.remove(name).is_some();
            if removed {
                providers.last_index += 1;
            }
            removed
        };
        if removed {
            self.rules.write().retain(|r| r.provider != name);
            info!(provider = %name, "Deleted identity provider and its binding rules");
        }
        removed
    }

    /// Provider names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.providers.read().by_name.keys().cloned().collect();
        names.sort();
        names
    }

    // =========================================================================
    // Binding rules
    // =========================================================================

    /// Append a binding rule, assigning an id when it has none
    pub fn create_binding_rule(&self, mut rule: BindingRule) -> BindingRule {
        if rule.id.is_empty() {
            rule.id = uuid::Uuid::new_v4().to_string();
        }
        info!(
            rule = %rule.id,
            provider = %rule.provider,
            bind_type = %rule.bind_type,
            "Stored binding rule"
        );
        self.rules.write().push(rule.clone());
        rule
    }

    /// Remove a binding rule by id
    pub fn delete_binding_rule(&self, id: &str) -> bool {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|r| r.id != id);
        let removed = rules.len() != before;
        if removed {
            info!(rule = %id, "Deleted binding rule");
        }
        removed
    }

    // =========================================================================
    // Roles
    // =========================================================================

    pub fn add_role(&self, name: impl Into<String>) {
        self.roles.write().insert(name.into());
    }
}

#[async_trait]
impl ProviderStore for MemoryStore {
    async fn get_provider(
        &self,
        name: &str,
    ) -> Result<Option<(u64, IdentityProviderConfig)>, StoreError> {
        let providers = self.providers.read();
        Ok(providers
            .by_name
            .get(name)
            .map(|config| (config.modify_index, config.clone())))
    }
}

#[async_trait]
impl BindingRuleStore for MemoryStore {
    async fn list_binding_rules(&self, provider: &str) -> Result<Vec<BindingRule>, StoreError> {
        let rules = self.rules.read();
        Ok(rules
            .iter()
            .filter(|r| r.provider == provider)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleCatalog for MemoryStore {
    async fn role_exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.roles.read().contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_modify_index_is_monotonic() {
        let store = MemoryStore::new();
        let first = store.upsert_provider(IdentityProviderConfig::new("a", "testing"));
        let second = store.upsert_provider(IdentityProviderConfig::new("b", "testing"));
        let third = store.upsert_provider(IdentityProviderConfig::new("a", "testing"));

        assert!(first < second && second < third);
        let (index, config) = store.get_provider("a").await.unwrap().unwrap();
        assert_eq!(index, third);
        assert_eq!(config.modify_index, third);
    }

    #[tokio::test]
    async fn test_rules_filtered_in_insertion_order() {
        let store = MemoryStore::new();
        let r1 = store.create_binding_rule(BindingRule::new("a", "role", "one"));
        store.create_binding_rule(BindingRule::new("b", "role", "other"));
        let r3 = store.create_binding_rule(BindingRule::new("a", "service", "two"));

        let rules = store.list_binding_rules("a").await.unwrap();
        let ids: Vec<_> = rules.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![r1.id, r3.id]);
    }

    #[tokio::test]
    async fn test_delete_provider_cascades_rules() {
        let store = MemoryStore::new();
        store.upsert_provider(IdentityProviderConfig::new("a", "testing"));
        store.create_binding_rule(BindingRule::new("a", "role", "one"));

        assert!(store.delete_provider("a"));
        assert!(store.get_provider("a").await.unwrap().is_none());
        assert!(store.list_binding_rules("a").await.unwrap().is_empty());
        assert!(!store.delete_provider("a"));
    }

    #[tokio::test]
    async fn test_delete_binding_rule() {
        let store = MemoryStore::new();
        let kept = store.create_binding_rule(BindingRule::new("a", "role", "one"));
        let dropped = store.create_binding_rule(BindingRule::new("a", "role", "two"));

        assert!(store.delete_binding_rule(&dropped.id));
        assert!(!store.delete_binding_rule(&dropped.id));
        let rules = store.list_binding_rules("a").await.unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_role_catalog() {
        let store = MemoryStore::new();
        store.add_role("k8s-demo");
        assert!(store.role_exists("k8s-demo").await.unwrap());
        assert!(!store.role_exists("k8s-other").await.unwrap());
    }
}
