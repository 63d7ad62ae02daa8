//! API request handlers

pub mod admin;
pub mod login;

pub use admin::{
    create_binding_rule, delete_binding_rule, delete_idp, list_idp_types, purge_validators, put_idp, IdpTypesResponse,
    PurgeResponse, PutIdpResponse,
};
pub use login::{login, LoginRequest, LoginResponse};
