//! Validator Registry - maps provider type tags to constructors
//!
//! The registry is an explicit object built once at startup by the
//! composing code and shared by reference. Registration happens during
//! initialization; afterwards the table is only read.

use federa_core::IdentityProviderConfig;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{BridgeError, Result};
use crate::validator::Validator;
use crate::validators;

/// Constructor for one provider type
///
/// Must be a pure function of the configuration: it may be slow or fail,
/// but it must not touch shared state.
pub type ValidatorFactory =
    Arc<dyn Fn(&IdentityProviderConfig) -> Result<Arc<dyn Validator>> + Send + Sync>;

/// Registry of validator constructors keyed by type tag
pub struct ValidatorRegistry {
    factories: RwLock<BTreeMap<String, ValidatorFactory>>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a registry holding the production validator types
    ///
    /// The `testing` type is not included; register it explicitly with
    /// [`validators::testing::register`].
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        validators::kubernetes::register(&registry);
        validators::introspection::register(&registry);
        registry
    }

    /// Register a constructor for a type tag
    ///
    /// # Panics
    ///
    /// Panics if `provider_type` is already registered. Registration is a
    /// startup-time programming step, so a duplicate aborts startup rather
    /// than surfacing on first use.
    pub fn register<F>(&self, provider_type: impl Into<String>, factory: F)
    where
        F: Fn(&IdentityProviderConfig) -> Result<Arc<dyn Validator>> + Send + Sync + 'static,
    {
        let provider_type = provider_type.into();
        let mut factories = self.factories.write();
        if factories.contains_key(&provider_type) {
            panic!(
                "validator registry: register called twice for type {:?}",
                provider_type
            );
        }
        info!(provider_type = %provider_type, "Registered validator type");
        factories.insert(provider_type, Arc::new(factory));
    }

    /// Whether a type tag has a constructor
    pub fn is_registered(&self, provider_type: &str) -> bool {
        self.factories.read().contains_key(provider_type)
    }

    /// Construct a validator for a provider configuration
    ///
    /// The constructor runs outside the registry lock.
    pub fn create(&self, config: &IdentityProviderConfig) -> Result<Arc<dyn Validator>> {
        let factory = self
            .factories
            .read()
            .get(&config.provider_type)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownProviderType {
                provider: config.name.clone(),
                provider_type: config.provider_type.clone(),
            })?;

        debug!(
            provider = %config.name,
            provider_type = %config.provider_type,
            "Constructing validator"
        );
        factory(config)
    }

    /// Registered type tags, sorted
    pub fn types(&self) -> Vec<String> {
        self.factories.read().keys().cloned().collect()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("types", &self.types())
            .finish()
    }
}
