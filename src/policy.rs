//! Policies and their validation.
//!
//! A policy pairs an action scope with an optional role gate and an optional
//! attribute condition. Policy lists are validated when they are loaded or
//! written; a list that fails validation is rejected as a whole.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::condition::{Condition, DEFAULT_MAX_CONDITION_DEPTH};
use crate::error::PolicyError;
use crate::target::{ActionScope, Rbac};

/// Limits applied when validating and evaluating policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyConfig {
    /// Maximum nesting of an ABAC condition.
    pub max_condition_depth: usize,
    /// Maximum length of ids, descriptions, actions, roles and condition strings.
    pub max_string_len: usize,
    /// Maximum number of policies in one list.
    pub max_policies: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig {
            max_condition_depth: DEFAULT_MAX_CONDITION_DEPTH,
            max_string_len: 4096,
            max_policies: 10_000,
        }
    }
}

/// A declarative access rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", rename_all = "camelCase")]
pub struct Policy {
    /// Unique, stable identifier.
    pub id: String,
    /// Human-readable summary, echoed in the decision reason.
    pub description: String,
    pub actions: ActionScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<Rbac>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abac: Option<Condition>,
}

/// Persisted shape, before the JSON-Logic clause is compiled.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPolicy {
    id: String,
    #[serde(default)]
    description: String,
    actions: ActionScope,
    #[serde(default)]
    rbac: Option<Rbac>,
    #[serde(default)]
    abac: Option<Condition>,
    #[serde(default)]
    abac_logic: Option<serde_json::Value>,
}

impl TryFrom<RawPolicy> for Policy {
    type Error = PolicyError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        let abac = match (raw.abac, raw.abac_logic) {
            (Some(_), Some(_)) => return Err(PolicyError::ConflictingConditions { id: raw.id }),
            (Some(native), None) => Some(native),
            (None, Some(logic)) => Some(Condition::from_json_logic(&logic)),
            (None, None) => None,
        };
        Ok(Policy {
            id: raw.id,
            description: raw.description,
            actions: raw.actions,
            rbac: raw.rbac,
            abac,
        })
    }
}

impl Policy {
    /// Start building a policy with the given id.
    pub fn builder(id: impl Into<String>) -> PolicyBuilder {
        PolicyBuilder::new(id)
    }

    /// Check this policy against the configured limits.
    pub fn validate(&self, index: usize, config: &PolicyConfig) -> Result<(), PolicyError> {
        if self.id.is_empty() {
            return Err(PolicyError::EmptyId { index });
        }
        if self.actions.is_empty() {
            return Err(PolicyError::EmptyActions {
                id: self.id.clone(),
            });
        }

        let roles = self.rbac.iter().flat_map(|r| r.any_role.iter());
        let longest = std::iter::once(&self.id)
            .chain(std::iter::once(&self.description))
            .chain(self.actions.as_slice())
            .chain(roles)
            .map(String::len)
            .max()
            .unwrap_or(0);
        if longest > config.max_string_len {
            return Err(PolicyError::StringTooLong {
                id: self.id.clone(),
                max: config.max_string_len,
                actual: longest,
            });
        }

        if let Some(abac) = &self.abac {
            abac.validate(config.max_condition_depth, config.max_string_len)
                .map_err(|source| PolicyError::InvalidCondition {
                    id: self.id.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Validate an ordered policy list: list size, unique ids, and every policy.
pub fn validate_policies(policies: &[Policy], config: &PolicyConfig) -> Result<(), PolicyError> {
    if policies.len() > config.max_policies {
        return Err(PolicyError::TooManyPolicies {
            max: config.max_policies,
            actual: policies.len(),
        });
    }

    let mut seen = HashSet::with_capacity(policies.len());
    for (index, policy) in policies.iter().enumerate() {
        policy.validate(index, config)?;
        if !seen.insert(policy.id.as_str()) {
            return Err(PolicyError::DuplicateId {
                id: policy.id.clone(),
            });
        }
    }
    Ok(())
}

/// Builder for constructing a single policy.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    policy: Policy,
    config: PolicyConfig,
}

impl PolicyBuilder {
    /// Create a builder. The policy starts with no actions.
    pub fn new(id: impl Into<String>) -> Self {
        PolicyBuilder {
            policy: Policy {
                id: id.into(),
                description: String::new(),
                actions: ActionScope::default(),
                rbac: None,
                abac: None,
            },
            config: PolicyConfig::default(),
        }
    }

    /// Set the limits used by `build()`.
    pub fn config(mut self, config: PolicyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.policy.description = description.into();
        self
    }

    /// Restrict the policy to the given actions.
    pub fn actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.actions = ActionScope::one_of(actions);
        self
    }

    /// Apply the policy to every action.
    pub fn any_action(mut self) -> Self {
        self.policy.actions = ActionScope::any();
        self
    }

    /// Require at least one of the given roles.
    pub fn any_role<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.rbac = Some(Rbac::any_role(roles));
        self
    }

    /// Require a condition to hold.
    pub fn abac(mut self, condition: Condition) -> Self {
        self.policy.abac = Some(condition);
        self
    }

    /// Validate and return the policy.
    pub fn build(self) -> Result<Policy, PolicyError> {
        self.policy.validate(0, &self.config)?;
        Ok(self.policy)
    }
}
