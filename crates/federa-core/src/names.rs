//! Naming rules for computed grant names

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::NameError;

/// Maximum length of a service identity or role name
pub const MAX_NAME_LENGTH: usize = 256;

/// Lowercase alphanumerics, `-` and `_`, starting and ending alphanumeric
static SERVICE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]([a-z0-9\-_]*[a-z0-9])?$").unwrap());

static ROLE_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-_]{1,256}$").unwrap());

/// Whether `name` is a valid service identity name
pub fn is_valid_service_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LENGTH && SERVICE_NAME_REGEX.is_match(name)
}

/// Whether `name` is a valid role name
pub fn is_valid_role_name(name: &str) -> bool {
    ROLE_NAME_REGEX.is_match(name)
}

pub fn validate_service_name(name: &str) -> Result<(), NameError> {
    if is_valid_service_name(name) {
        Ok(())
    } else {
        Err(NameError::InvalidServiceName(name.to_string()))
    }
}

pub fn validate_role_name(name: &str) -> Result<(), NameError> {
    if is_valid_role_name(name) {
        Ok(())
    } else {
        Err(NameError::InvalidRoleName(name.to_string()))
    }
}
