//! The capability contract every identity provider backend implements

use async_trait::async_trait;
use federa_core::{SelectableFields, VerifiedFields};

use crate::error::Result;

/// Trait for identity provider validators
///
/// A validator is built from one immutable snapshot of an
/// [`IdentityProviderConfig`](federa_core::IdentityProviderConfig) and is
/// never mutated afterwards; a configuration change produces a new
/// instance. Implementations must tolerate concurrent, repeated calls to
/// [`validate_login`](Validator::validate_login).
#[async_trait]
pub trait Validator: Send + Sync {
    /// Name of the provider this validator was built for
    fn name(&self) -> &str;

    /// Verify a raw login token and extract identity attributes
    ///
    /// # Returns
    /// * `Ok(VerifiedFields)` - attributes keyed by the names in
    ///   [`available_fields`](Validator::available_fields)
    /// * `Err(BridgeError)` - an authentication error if the token is
    ///   malformed, fails verification, the external call fails, or the
    ///   asserted attributes disagree
    async fn validate_login(&self, token: &str) -> Result<VerifiedFields>;

    /// Every field name this provider may return, in declaration order
    fn available_fields(&self) -> Vec<String>;

    /// Convert a verified field map into its selectable form
    ///
    /// The default projects the map onto the declared fields.
    fn make_field_map_selectable(&self, fields: &VerifiedFields) -> SelectableFields {
        SelectableFields::project(&self.available_fields(), fields)
    }

    /// Get a description of this validator (for logging)
    fn description(&self) -> &str {
        "identity provider validator"
    }
}
