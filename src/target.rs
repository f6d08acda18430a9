//! Action scope and role gate for policies.
//!
//! Actions are matched by exact string or the `*` wildcard.
//! No prefix or pattern matching - intentionally omitted to avoid footguns.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The action entry that matches every request.
pub const WILDCARD: &str = "*";

/// The actions a policy applies to, in authoring order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionScope(Vec<String>);

impl ActionScope {
    /// A scope matching every action.
    pub fn any() -> Self {
        ActionScope(vec![WILDCARD.to_owned()])
    }

    /// A scope matching exactly the listed actions.
    pub fn one_of<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ActionScope(actions.into_iter().map(Into::into).collect())
    }

    /// Check if this scope covers the requested action.
    pub fn matches(&self, action: &str) -> bool {
        self.0.iter().any(|a| a == WILDCARD || a == action)
    }

    /// Returns `true` if the scope contains the wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.0.iter().any(|a| a == WILDCARD)
    }

    /// Returns `true` if no actions are listed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The listed actions.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

/// Role requirement of a policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rbac {
    /// The subject must hold at least one of these. Empty means unrestricted.
    #[serde(default)]
    pub any_role: BTreeSet<String>,
}

impl Rbac {
    /// Require any of the given roles.
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Rbac {
            any_role: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Check the subject's roles against the requirement.
    pub fn permits(&self, roles: &BTreeSet<String>) -> bool {
        self.any_role.is_empty() || !self.any_role.is_disjoint(roles)
    }
}
