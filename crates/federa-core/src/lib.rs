//! # Federa Core
//!
//! Data model and pure evaluation primitives for turning a verified external
//! login into access grants.
//!
//! ## Key Concepts
//!
//! - **Identity provider**: an external authority that vouches for a caller
//!   given a login token. Configured as an [`IdentityProviderConfig`].
//! - **Verified fields**: the flat `field -> value` map a provider returns
//!   after a successful login.
//! - **Binding rule**: a selector, a bind type and a bind-name template that
//!   together turn verified fields into a [`Grant`].
//! - **Selector**: a boolean expression over dotted field paths.
//! - **Bind-name template**: a string with `{{field}}` placeholders.
//!
//! Nothing in this crate performs I/O. Provider validators, caching and the
//! login flow live in `federa-bridge`.

pub mod error;
pub mod names;
pub mod selector;
pub mod template;
pub mod types;

pub use error::{NameError, SelectorError, TemplateError};
pub use names::{validate_role_name, validate_service_name};
pub use selector::Selector;
pub use template::BindNameTemplate;
pub use types::{
    BindType, BindingRule, Grant, Grants, IdentityProviderConfig, RoleLink, RoleResolution,
    SelectableFields, ServiceIdentity, VerifiedFields,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
