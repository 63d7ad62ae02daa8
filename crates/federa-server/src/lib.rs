//! Federa Server
//!
//! HTTP front end for the identity bridge. Callers exchange an external
//! login token for the service identities and roles their new token
//! should carry.
//!
//! ## API Endpoints
//!
//! ### Core Endpoints
//! - `GET /health` - Liveness check
//! - `GET /ready` - Readiness check with registered provider types
//! - `POST /v1/acl/login` - Exchange a provider login token for grants
//!
//! ### Admin Endpoints
//! - `GET /v1/acl/idp-types` - List registered provider types
//! - `PUT /v1/acl/idp` - Create or replace an identity provider
//! - `POST /v1/acl/binding-rule` - Create a binding rule
//! - `POST /v1/acl/validators/purge` - Drop every cached validator

pub mod api;
pub mod config;
pub mod state;

pub use api::create_router;
pub use config::{Bootstrap, ServerConfig};
pub use state::AppState;
