//! End-to-end login: provider lookup, cached validator, rule evaluation

use async_trait::async_trait;
use federa_bridge::validators::testing::{self, TestingValidator};
use federa_bridge::{
    BindingEvaluator, BridgeError, ErrorKind, LoginService, MemoryStore, Result, Validator,
    ValidatorCache, ValidatorRegistry,
};
use federa_core::{
    BindingRule, Grant, IdentityProviderConfig, RoleResolution, SelectableFields, VerifiedFields,
};
use serde_json::json;
use std::sync::Arc;

// =============================================================================
// Test Helpers
// =============================================================================

struct Harness {
    store: Arc<MemoryStore>,
    login: LoginService,
}

fn harness(registry: ValidatorRegistry) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(ValidatorCache::new(Arc::new(registry)));
    let binder = BindingEvaluator::new(store.clone()).with_role_catalog(store.clone());
    Harness {
        login: LoginService::new(store.clone(), cache, binder),
        store,
    }
}

fn testing_registry() -> ValidatorRegistry {
    let registry = ValidatorRegistry::with_builtins();
    testing::register(&registry);
    registry
}

fn minikube() -> IdentityProviderConfig {
    IdentityProviderConfig::new("minikube", testing::TYPE).with_config(json!({
        "tokens": {
            "tok-default-demo": {"namespace": "default", "name": "demo", "uid": "u-1"},
            "tok-prod-demo": {"namespace": "prod", "name": "demo", "uid": "u-2"},
            "tok-default-api": {"namespace": "default", "name": "api", "uid": "u-3"}
        }
    }))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_namespace_rule_grants_role() {
    let Harness { store, login } = harness(testing_registry());
    store.upsert_provider(minikube());
    store.create_binding_rule(
        BindingRule::new("minikube", "role", "k8s-{{serviceaccount.name}}")
            .with_selector("serviceaccount.namespace==default"),
    );

    let outcome = login.login("minikube", "tok-default-demo").await.unwrap();
    assert_eq!(outcome.grants.into_vec(), vec![Grant::role("k8s-demo")]);

    let outcome = login.login("minikube", "tok-prod-demo").await.unwrap();
    assert!(outcome.grants.is_empty());
}

#[tokio::test]
async fn test_service_and_role_grants() {
    let Harness { store, login } = harness(testing_registry());
    store.upsert_provider(minikube());
    store.create_binding_rule(BindingRule::new(
        "minikube",
        "service",
        "{{serviceaccount.name}}",
    ));
    store.create_binding_rule(
        BindingRule::new("minikube", "role", "admins")
            .with_selector("serviceaccount.name==api and not serviceaccount.namespace==prod"),
    );

    let outcome = login.login("minikube", "tok-default-api").await.unwrap();
    let names: Vec<_> = outcome.grants.iter().map(Grant::name).collect();
    assert_eq!(names, vec!["api", "admins"]);
    assert_eq!(outcome.grants.service_identities().len(), 1);
    assert_eq!(outcome.grants.role_links().len(), 1);

    let outcome = login.login("minikube", "tok-prod-demo").await.unwrap();
    assert_eq!(outcome.grants.into_vec(), vec![Grant::service("demo")]);
}

#[tokio::test]
async fn test_existing_roles_must_be_defined() {
    let Harness { store, login } = harness(testing_registry());
    store.upsert_provider(minikube());
    store.create_binding_rule(
        BindingRule::new("minikube", "role", "k8s-{{serviceaccount.name}}")
            .with_role_resolution(RoleResolution::Existing),
    );

    let err = login.login("minikube", "tok-default-demo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RuleEvaluation);

    store.add_role("k8s-demo");
    let outcome = login.login("minikube", "tok-default-demo").await.unwrap();
    assert_eq!(outcome.grants.into_vec(), vec![Grant::role("k8s-demo")]);
}

#[tokio::test]
async fn test_unknown_provider_type() {
    let Harness { store, login } = harness(ValidatorRegistry::with_builtins());
    store.upsert_provider(minikube());

    let err = login.login("minikube", "tok-default-demo").await.unwrap_err();
    assert!(matches!(err, BridgeError::UnknownProviderType { .. }));
}

#[tokio::test]
async fn test_deleted_provider_takes_rules_with_it() {
    let Harness { store, login } = harness(testing_registry());
    store.upsert_provider(minikube());
    store.create_binding_rule(BindingRule::new("minikube", "role", "everyone"));
    assert!(store.delete_provider("minikube"));

    let err = login.login("minikube", "tok-default-demo").await.unwrap_err();
    assert!(matches!(err, BridgeError::ProviderNotFound(_)));

    store.upsert_provider(minikube());
    let outcome = login.login("minikube", "tok-default-demo").await.unwrap();
    assert!(outcome.grants.is_empty());
}

#[tokio::test]
async fn test_purge_forces_rebuild() {
    let Harness { store, login } = harness(testing_registry());
    store.upsert_provider(minikube());

    login.login("minikube", "tok-default-demo").await.unwrap();
    let (_, before) = login.cache().get("minikube").unwrap();

    login.cache().purge();
    login.login("minikube", "tok-default-demo").await.unwrap();
    let (_, after) = login.cache().get("minikube").unwrap();

    assert!(!Arc::ptr_eq(&before, &after));
}

/// Provider with a custom selectable form: groups are exposed as a single
/// comma-joined field
struct GroupsValidator;

#[async_trait]
impl Validator for GroupsValidator {
    fn name(&self) -> &str {
        "groups"
    }

    async fn validate_login(&self, token: &str) -> Result<VerifiedFields> {
        let mut fields = VerifiedFields::new();
        fields.insert("user.name".into(), token.to_string());
        fields.insert("user.groups".into(), "dev,ops".into());
        Ok(fields)
    }

    fn available_fields(&self) -> Vec<String> {
        vec!["user.name".into(), "user.groups".into()]
    }

    fn make_field_map_selectable(&self, fields: &VerifiedFields) -> SelectableFields {
        let mut pairs: Vec<(String, String)> = fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let is_ops = fields
            .get("user.groups")
            .map(|g| g.split(',').any(|g| g == "ops"))
            .unwrap_or(false);
        pairs.push(("user.is_ops".into(), is_ops.to_string()));
        pairs.into_iter().collect()
    }
}

#[tokio::test]
async fn test_custom_provider_type() {
    let registry = ValidatorRegistry::new();
    registry.register("groups", |_: &IdentityProviderConfig| {
        Ok(Arc::new(GroupsValidator) as Arc<dyn Validator>)
    });
    let Harness { store, login } = harness(registry);

    store.upsert_provider(IdentityProviderConfig::new("groups", "groups"));
    store.create_binding_rule(
        BindingRule::new("groups", "role", "ops-{{user.name}}").with_selector("user.is_ops==true"),
    );

    let outcome = login.login("groups", "alice").await.unwrap();
    assert_eq!(outcome.grants.into_vec(), vec![Grant::role("ops-alice")]);
}

#[tokio::test]
async fn test_rule_checked_against_provider_fields() {
    let validator = TestingValidator::new("minikube");

    let ok = BindingRule::new("minikube", "service", "{{serviceaccount.name}}")
        .with_selector("serviceaccount.namespace != kube-system");
    assert!(BindingEvaluator::check_rule(&ok, &validator).is_ok());

    let bad = BindingRule::new("minikube", "service", "{{user.name}}");
    let err = BindingEvaluator::check_rule(&bad, &validator).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidRule(_)));
}
