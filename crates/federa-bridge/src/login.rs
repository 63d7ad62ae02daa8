//! Login flow - provider lookup, token validation and grant computation

use federa_core::Grants;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::binder::BindingEvaluator;
use crate::cache::ValidatorCache;
use crate::error::{BridgeError, Result};
use crate::store::ProviderStore;

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoginOutcome {
    /// Provider that vouched for the caller
    pub provider: String,

    /// Grants in rule evaluation order; may be empty
    pub grants: Grants,
}

/// Turns `(provider, token)` into grants
#[derive(Debug)]
pub struct LoginService {
    providers: Arc<dyn ProviderStore>,
    cache: Arc<ValidatorCache>,
    binder: BindingEvaluator,
}

impl LoginService {
    pub fn new(
        providers: Arc<dyn ProviderStore>,
        cache: Arc<ValidatorCache>,
        binder: BindingEvaluator,
    ) -> Self {
        Self {
            providers,
            cache,
            binder,
        }
    }

    pub fn cache(&self) -> &Arc<ValidatorCache> {
        &self.cache
    }

    /// Log in with a token issued by `provider`
    ///
    /// The validator is loaded at the provider's current modify index, so a
    /// configuration change is picked up by the next login after it lands.
    #[instrument(skip(self, token))]
    pub async fn login(&self, provider: &str, token: &str) -> Result<LoginOutcome> {
        let (index, config) = self
            .providers
            .get_provider(provider)
            .await?
            .ok_or_else(|| BridgeError::ProviderNotFound(provider.to_string()))?;

        let validator = self.cache.load(index, &config)?;

        let fields = validator.validate_login(token).await.map_err(|e| {
            warn!(error = %e, validator = %validator.description(), "Login token rejected");
            e
        })?;

        let grants = self.binder.evaluate(validator.as_ref(), &fields).await?;

        info!(
            modify_index = index,
            service_identities = grants.service_identities().len(),
            roles = grants.role_links().len(),
            "Login verified"
        );

        Ok(LoginOutcome {
            provider: provider.to_string(),
            grants,
        })
    }
}
