//! Core types shared by validators, the binding evaluator and the server

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verified identity attributes returned by a successful login
///
/// Keys are dotted field paths such as `serviceaccount.name`. The set of
/// legal keys is declared by the provider that produced the map.
pub type VerifiedFields = BTreeMap<String, String>;

/// Configuration of one identity provider as held by the config store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityProviderConfig {
    /// Unique provider name
    pub name: String,

    /// Type tag selecting the validator constructor (e.g. "kubernetes")
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Provider-specific configuration, decoded by the validator constructor
    #[serde(default)]
    pub config: serde_json::Value,

    /// Version assigned by the backing store on every change
    #[serde(default)]
    pub modify_index: u64,
}

impl IdentityProviderConfig {
    /// Create a new provider configuration with an empty config blob
    pub fn new(name: impl Into<String>, provider_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_type: provider_type.into(),
            description: String::new(),
            config: serde_json::Value::Object(Default::default()),
            modify_index: 0,
        }
    }

    /// Set the provider-specific configuration
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the modify index
    pub fn with_modify_index(mut self, modify_index: u64) -> Self {
        self.modify_index = modify_index;
        self
    }
}

/// Structured, queryable form of a verified field map
///
/// One flat mapping from dotted path to value, independent of the provider
/// that produced it. Every field the provider declares is present; a
/// declared field missing from the verified map holds the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectableFields {
    fields: BTreeMap<String, String>,
}

impl SelectableFields {
    /// Project a verified field map onto the provider's declared fields
    pub fn project<S: AsRef<str>>(available: &[S], verified: &VerifiedFields) -> Self {
        let fields = available
            .iter()
            .map(|name| {
                let name = name.as_ref();
                let value = verified.get(name).cloned().unwrap_or_default();
                (name.to_string(), value)
            })
            .collect();
        Self { fields }
    }

    /// Look up a declared field
    pub fn get(&self, path: &str) -> Option<&str> {
        self.fields.get(path).map(String::as_str)
    }

    /// Whether the path is declared
    pub fn contains(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over `(path, value)` pairs in path order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SelectableFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// What a matching binding rule grants
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindType {
    /// Grant a service identity
    Service,
    /// Link a role
    Role,
    /// A bind type this build does not understand; evaluation skips it
    Other(String),
}

impl BindType {
    pub fn as_str(&self) -> &str {
        match self {
            BindType::Service => "service",
            BindType::Role => "role",
            BindType::Other(other) => other,
        }
    }
}

impl std::fmt::Display for BindType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BindType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "service" => BindType::Service,
            "role" => BindType::Role,
            _ => BindType::Other(value),
        }
    }
}

impl From<&str> for BindType {
    fn from(value: &str) -> Self {
        BindType::from(value.to_string())
    }
}

impl From<BindType> for String {
    fn from(value: BindType) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for BindType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for BindType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(BindType::from)
    }
}

/// How a `role` rule's computed name is resolved at login time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleResolution {
    /// The computed name is granted as a bound name; no role needs to exist
    #[default]
    Synthetic,
    /// The computed name must name a role that exists when the login happens
    Existing,
}

/// A rule converting verified fields into a grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingRule {
    /// Store-assigned identifier
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Name of the provider this rule applies to
    pub provider: String,

    /// Boolean selector; empty matches every login
    #[serde(default)]
    pub selector: String,

    pub bind_type: BindType,

    /// Bind-name template with `{{field}}` placeholders
    pub bind_name: String,

    /// Only meaningful for `role` rules
    #[serde(default)]
    pub role_resolution: RoleResolution,
}

impl BindingRule {
    /// Create a new binding rule with an empty (catch-all) selector
    pub fn new(
        provider: impl Into<String>,
        bind_type: impl Into<BindType>,
        bind_name: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            description: String::new(),
            provider: provider.into(),
            selector: String::new(),
            bind_type: bind_type.into(),
            bind_name: bind_name.into(),
            role_resolution: RoleResolution::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_role_resolution(mut self, resolution: RoleResolution) -> Self {
        self.role_resolution = resolution;
        self
    }
}

/// A service identity granted to the new token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceIdentity {
    pub name: String,
}

/// A role linked to the new token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleLink {
    pub name: String,
}

/// One access grant computed for a login
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Grant {
    ServiceIdentity(ServiceIdentity),
    RoleLink(RoleLink),
}

impl Grant {
    pub fn service(name: impl Into<String>) -> Self {
        Grant::ServiceIdentity(ServiceIdentity { name: name.into() })
    }

    pub fn role(name: impl Into<String>) -> Self {
        Grant::RoleLink(RoleLink { name: name.into() })
    }

    pub fn name(&self) -> &str {
        match self {
            Grant::ServiceIdentity(s) => &s.name,
            Grant::RoleLink(r) => &r.name,
        }
    }
}

/// Grants accumulated for one login, in rule-evaluation order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grants(Vec<Grant>);

impl Grants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, grant: Grant) {
        self.0.push(grant);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Grant> {
        self.0.iter()
    }

    /// Service identities, in evaluation order
    pub fn service_identities(&self) -> Vec<&ServiceIdentity> {
        self.0
            .iter()
            .filter_map(|g| match g {
                Grant::ServiceIdentity(s) => Some(s),
                Grant::RoleLink(_) => None,
            })
            .collect()
    }

    /// Role links, in evaluation order
    pub fn role_links(&self) -> Vec<&RoleLink> {
        self.0
            .iter()
            .filter_map(|g| match g {
                Grant::RoleLink(r) => Some(r),
                Grant::ServiceIdentity(_) => None,
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<Grant> {
        self.0
    }
}

impl From<Vec<Grant>> for Grants {
    fn from(grants: Vec<Grant>) -> Self {
        Self(grants)
    }
}

impl<'a> IntoIterator for &'a Grants {
    type Item = &'a Grant;
    type IntoIter = std::slice::Iter<'a, Grant>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
