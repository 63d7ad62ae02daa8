//! Store abstractions the bridge reads from
//!
//! The replicated configuration store and the binding rule store are
//! external collaborators. This module defines the read interfaces the
//! bridge needs from them, plus an in-memory backend used by the server
//! and by tests.
//!
//! Implementations must be thread-safe and support concurrent access.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use federa_core::{BindingRule, IdentityProviderConfig};
use std::fmt::Debug;

/// Error type for store reads
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Read access to identity provider configurations
#[async_trait]
pub trait ProviderStore: Send + Sync + Debug {
    /// Look up a provider by name
    ///
    /// Returns the modify index observed for the provider along with its
    /// configuration. The index never decreases across successive reads.
    async fn get_provider(
        &self,
        name: &str,
    ) -> Result<Option<(u64, IdentityProviderConfig)>, StoreError>;
}

/// Read access to binding rules
#[async_trait]
pub trait BindingRuleStore: Send + Sync + Debug {
    /// All rules for one provider, in store order
    async fn list_binding_rules(&self, provider: &str) -> Result<Vec<BindingRule>, StoreError>;
}

/// Role existence checks for `existing` role rules
#[async_trait]
pub trait RoleCatalog: Send + Sync + Debug {
    async fn role_exists(&self, name: &str) -> Result<bool, StoreError>;
}
