//! Validator Cache - per-provider validators versioned by modify index
//!
//! Building a validator can mean network and TLS setup against the external
//! authority, so built validators are kept per provider name together with
//! the config store index they were built at.
//!
//! ## Load protocol
//!
//! 1. **Fast path**: under the read lock, an entry whose index is at least
//!    the requested index is returned as-is.
//! 2. **Slow path**: the validator is constructed with no lock held.
//!    Construction errors go straight back to the caller and nothing is
//!    cached.
//! 3. **Publish**: under the write lock, the new validator is stored only if
//!    the slot is still older than the new index; otherwise the already
//!    published validator wins and the new one is dropped.
//!
//! Concurrent cold loads for one name may each construct a validator; exactly
//! one is published per index.

use federa_core::IdentityProviderConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::ValidatorRegistry;
use crate::validator::Validator;

struct CacheEntry {
    validator: Arc<dyn Validator>,
    modify_index: u64,
}

/// Cache of constructed validators keyed by provider name
pub struct ValidatorCache {
    registry: Arc<ValidatorRegistry>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ValidatorCache {
    /// Create an empty cache that constructs through `registry`
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self {
            registry,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ValidatorRegistry> {
        &self.registry
    }

    /// Get the validator for `config` as of store index `index`
    pub fn load(&self, index: u64, config: &IdentityProviderConfig) -> Result<Arc<dyn Validator>> {
        if let Some((cached_index, validator)) = self.get(&config.name) {
            if cached_index >= index {
                return Ok(validator);
            }
        }

        let validator = self.registry.create(config).map_err(|e| {
            warn!(
                provider = %config.name,
                provider_type = %config.provider_type,
                error = %e,
                "Validator construction failed"
            );
            e
        })?;

        Ok(self.publish(&config.name, index, validator))
    }

    /// Cached validator and its index, without constructing anything
    pub fn get(&self, name: &str) -> Option<(u64, Arc<dyn Validator>)> {
        self.entries
            .read()
            .get(name)
            .map(|entry| (entry.modify_index, entry.validator.clone()))
    }

    /// Store `validator` unless an entry at least as new is already present
    fn publish(&self, name: &str, index: u64, validator: Arc<dyn Validator>) -> Arc<dyn Validator> {
        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(name) {
            if existing.modify_index >= index {
                debug!(
                    provider = %name,
                    cached_index = existing.modify_index,
                    built_index = index,
                    "Discarding validator, a newer one was published concurrently"
                );
                return existing.validator.clone();
            }
        }

        info!(provider = %name, modify_index = index, "Updating cached validator");
        entries.insert(
            name.to_string(),
            CacheEntry {
                validator: validator.clone(),
                modify_index: index,
            },
        );
        validator
    }

    /// Drop every cached validator
    ///
    /// Used on bulk invalidation signals such as a leadership change or a
    /// snapshot restore.
    pub fn purge(&self) {
        let previous = std::mem::take(&mut *self.entries.write());
        info!(purged = previous.len(), "Purged validator cache");
    }

    /// Number of cached validators
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let mut slots: Vec<_> = entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.modify_index))
            .collect();
        slots.sort();
        f.debug_struct("ValidatorCache").field("entries", &slots).finish()
    }
}
