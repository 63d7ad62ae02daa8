//! Binding Evaluator - turns verified fields into access grants
//!
//! Failure policy is asymmetric:
//! - a selector that fails to parse or evaluate simply does not match,
//!   so one bad selector cannot deny grants from other rules;
//! - a matching rule whose bind name cannot be computed, or computes an
//!   invalid name, aborts the whole evaluation so no login is ever issued
//!   with a wrong identity.
//!
//! Unknown bind types are skipped.

use federa_core::{
    names, BindNameTemplate, BindType, BindingRule, Grant, Grants, RoleResolution,
    SelectableFields, Selector, VerifiedFields,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};
use crate::store::{BindingRuleStore, RoleCatalog};
use crate::validator::Validator;

/// Evaluates a provider's binding rules against verified fields
#[derive(Debug, Clone)]
pub struct BindingEvaluator {
    rules: Arc<dyn BindingRuleStore>,
    roles: Option<Arc<dyn RoleCatalog>>,
}

impl BindingEvaluator {
    /// Create an evaluator reading rules from `rules`
    pub fn new(rules: Arc<dyn BindingRuleStore>) -> Self {
        Self { rules, roles: None }
    }

    /// Resolve `existing` role rules against `roles`
    pub fn with_role_catalog(mut self, roles: Arc<dyn RoleCatalog>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Compute the grants for one verified login
    ///
    /// Rules are read once, as a point-in-time snapshot, and evaluated in
    /// store order. The returned grants follow the same order.
    pub async fn evaluate(
        &self,
        validator: &dyn Validator,
        fields: &VerifiedFields,
    ) -> Result<Grants> {
        let provider = validator.name();
        let rules = self.rules.list_binding_rules(provider).await?;
        if rules.is_empty() {
            debug!(provider = %provider, "No binding rules for provider");
            return Ok(Grants::new());
        }

        let selectable = validator.make_field_map_selectable(fields);

        let mut grants = Grants::new();
        for rule in &rules {
            if !rule_matches(rule, &selectable) {
                continue;
            }

            match &rule.bind_type {
                BindType::Service => {
                    let name = compute_bind_name(rule, fields)?;
                    names::validate_service_name(&name)
                        .map_err(|_| invalid_bind_name(rule, name.clone()))?;
                    grants.push(Grant::service(name));
                }
                BindType::Role => {
                    let name = compute_bind_name(rule, fields)?;
                    names::validate_role_name(&name)
                        .map_err(|_| invalid_bind_name(rule, name.clone()))?;
                    if rule.role_resolution == RoleResolution::Existing {
                        self.require_role(rule, &name).await?;
                    }
                    grants.push(Grant::role(name));
                }
                BindType::Other(other) => {
                    debug!(rule = %rule.id, bind_type = %other, "Skipping unknown bind type");
                }
            }
        }

        debug!(
            provider = %provider,
            rules = rules.len(),
            grants = grants.len(),
            "Evaluated binding rules"
        );
        Ok(grants)
    }

    async fn require_role(&self, rule: &BindingRule, name: &str) -> Result<()> {
        let roles = self
            .roles
            .as_ref()
            .ok_or_else(|| BridgeError::RoleCatalogUnavailable {
                rule: rule.id.clone(),
            })?;

        if roles.role_exists(name).await? {
            Ok(())
        } else {
            warn!(rule = %rule.id, role = %name, "Bound role does not exist");
            Err(BridgeError::RoleNotFound {
                rule: rule.id.clone(),
                role: name.to_string(),
            })
        }
    }

    /// Check a rule against the provider it is attached to
    ///
    /// The selector must parse and evaluate against the provider's declared
    /// fields, and the bind-name template must only reference declared
    /// fields. Used when a rule is written, so runtime evaluation only meets
    /// rules that were sane for the provider at write time.
    pub fn check_rule(rule: &BindingRule, validator: &dyn Validator) -> Result<()> {
        let available = validator.available_fields();

        if !rule.selector.is_empty() {
            let selector = Selector::parse(&rule.selector)
                .map_err(|e| BridgeError::InvalidRule(format!("selector is invalid: {}", e)))?;
            let blank = SelectableFields::project(&available, &VerifiedFields::new());
            selector
                .evaluate(&blank)
                .map_err(|e| BridgeError::InvalidRule(format!("selector is invalid: {}", e)))?;
        }

        let template = BindNameTemplate::parse(&rule.bind_name)
            .map_err(|e| BridgeError::InvalidRule(format!("bind name is invalid: {}", e)))?;
        if let Some(unknown) = template
            .fields()
            .into_iter()
            .find(|f| !available.iter().any(|a| a.as_str() == *f))
        {
            return Err(BridgeError::InvalidRule(format!(
                "bind name references unknown field {:?}",
                unknown
            )));
        }

        Ok(())
    }
}

/// Whether a rule's selector matches; any selector failure is a non-match
fn rule_matches(rule: &BindingRule, selectable: &SelectableFields) -> bool {
    if rule.selector.is_empty() {
        return true;
    }

    match Selector::parse(&rule.selector).and_then(|s| s.evaluate(selectable)) {
        Ok(matched) => matched,
        Err(e) => {
            debug!(rule = %rule.id, error = %e, "Selector failed, treating as no match");
            false
        }
    }
}

fn compute_bind_name(rule: &BindingRule, fields: &VerifiedFields) -> Result<String> {
    BindNameTemplate::parse(&rule.bind_name)
        .and_then(|tpl| tpl.render(fields))
        .map_err(|e| {
            warn!(rule = %rule.id, error = %e, "Cannot compute bind name");
            BridgeError::BindNameUnresolved {
                rule: rule.id.clone(),
                bind_type: rule.bind_type.to_string(),
                reason: e.to_string(),
            }
        })
}

fn invalid_bind_name(rule: &BindingRule, name: String) -> BridgeError {
    warn!(rule = %rule.id, name = %name, "Computed bind name is invalid");
    BridgeError::InvalidBindName {
        rule: rule.id.clone(),
        bind_type: rule.bind_type.to_string(),
        name,
    }
}
