//! Identity Bridge
//!
//! The bridge turns a login token issued by an external identity provider
//! into the set of grants a new internal token should carry.
//!
//! ## Architecture
//!
//! - **Validators** verify tokens for one provider type each:
//!   - **kubernetes**: service account JWTs, checked with the TokenReview API
//!   - **introspection**: OAuth 2.0 access tokens, via RFC 7662 introspection
//!   - **testing**: a fixed token table, registered explicitly
//! - **Registry** maps a provider type tag to a validator constructor.
//! - **Cache** keeps one constructed validator per provider, versioned by
//!   the config store's modify index.
//! - **Binding evaluator** matches the provider's binding rules against the
//!   verified fields and computes service identities and role links.
//!
//! ## Usage
//!
//! ```ignore
//! use federa_bridge::{BindingEvaluator, LoginService, MemoryStore, ValidatorCache, ValidatorRegistry};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let cache = Arc::new(ValidatorCache::new(Arc::new(ValidatorRegistry::with_builtins())));
//! let binder = BindingEvaluator::new(store.clone()).with_role_catalog(store.clone());
//! let login = LoginService::new(store, cache, binder);
//!
//! let outcome = login.login("minikube", "eyJ...").await?;
//! for role in outcome.grants.role_links() {
//!     println!("Role: {}", role.name);
//! }
//! ```

pub mod binder;
pub mod cache;
pub mod config;
pub mod error;
pub mod login;
pub mod registry;
pub mod store;
pub mod validator;
pub mod validators;

pub use binder::BindingEvaluator;
pub use cache::ValidatorCache;
pub use config::parse_config;
pub use error::{BridgeError, ErrorKind, Result};
pub use login::{LoginOutcome, LoginService};
pub use registry::{ValidatorFactory, ValidatorRegistry};
pub use store::{BindingRuleStore, MemoryStore, ProviderStore, RoleCatalog, StoreError};
pub use validator::Validator;
