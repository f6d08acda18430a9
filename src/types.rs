//! Core type definitions for the decision point.
//!
//! A request is built per call by the enforcement point from verified token
//! claims and its own data lookups. Nothing here is persisted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::value::{Attributes, Value};

/// Reason returned when no policy matches the request.
pub const NO_MATCHING_POLICY: &str = "No matching policy";

/// Prefix of the reason returned when a policy matches.
pub const MATCHED_PREFIX: &str = "Matched ";

/// The actor making the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    /// Unique subject identifier.
    pub sub: String,
    /// Role names. Membership only: order and duplicates are irrelevant.
    #[serde(default)]
    pub roles: BTreeSet<String>,
    /// Additional claims (tenant, department ids, ...).
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Subject {
    /// Create a subject with no roles or attributes.
    pub fn new(sub: impl Into<String>) -> Self {
        Subject {
            sub: sub.into(),
            ..Subject::default()
        }
    }

    /// Add roles.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Set one attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns `true` if the subject holds the role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert("sub".to_owned(), Value::String(self.sub.clone()));
        map.insert(
            "roles".to_owned(),
            Value::Array(self.roles.iter().cloned().map(Value::String).collect()),
        );
        Value::Object(map)
    }
}

/// The target of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// Type discriminator, e.g. `document`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ownership, status, visibility and similar facts.
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl Resource {
    /// Create a resource of the given type with no attributes.
    pub fn new(kind: impl Into<String>) -> Self {
        Resource {
            kind: kind.into(),
            attributes: Attributes::new(),
        }
    }

    /// Set one attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    fn to_value(&self) -> Value {
        let mut map = self.attributes.clone();
        map.insert("type".to_owned(), Value::String(self.kind.clone()));
        Value::Object(map)
    }
}

/// Request-scoped facts that belong to neither subject nor resource.
pub type Context = Attributes;

/// An authorization request. One request produces exactly one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub subject: Subject,
    /// Free-form, conventionally `resource-type:verb`.
    pub action: String,
    pub resource: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

impl DecisionRequest {
    /// Create a request with no context.
    pub fn new(subject: Subject, action: impl Into<String>, resource: Resource) -> Self {
        DecisionRequest {
            subject,
            action: action.into(),
            resource,
            context: None,
        }
    }

    /// Attach request context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Build the tree that `${...}` paths resolve against.
    ///
    /// Root keys are `subject`, `action`, `resource` and, when present,
    /// `context`. The fixed fields `sub`, `roles` and `type` win over
    /// attributes of the same name.
    pub fn to_value(&self) -> Value {
        let mut root = Attributes::new();
        root.insert("subject".to_owned(), self.subject.to_value());
        root.insert("action".to_owned(), Value::String(self.action.clone()));
        root.insert("resource".to_owned(), self.resource.to_value());
        if let Some(context) = &self.context {
            root.insert("context".to_owned(), Value::Object(context.clone()));
        }
        Value::Object(root)
    }
}

/// The result of evaluating a request against a policy list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionResponse {
    pub allow: bool,
    /// Always populated.
    pub reason: String,
    /// Present iff a policy matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_policy_id: Option<String>,
}

impl DecisionResponse {
    /// An allow decision attributed to the given policy.
    pub fn matched(policy_id: &str, description: &str) -> Self {
        DecisionResponse {
            allow: true,
            reason: format!("{MATCHED_PREFIX}{description}"),
            matched_policy_id: Some(policy_id.to_owned()),
        }
    }

    /// The default deny.
    pub fn no_match() -> Self {
        DecisionResponse {
            allow: false,
            reason: NO_MATCHING_POLICY.to_owned(),
            matched_policy_id: None,
        }
    }

    /// Returns `true` if this decision allows access.
    #[inline]
    pub fn is_allow(&self) -> bool {
        self.allow
    }

    /// Returns `true` if this decision denies access.
    #[inline]
    pub fn is_deny(&self) -> bool {
        !self.allow
    }
}
