//! # gatepdp
//!
//! A small, deterministic policy decision point combining role-based and
//! attribute-based checks.
//!
//! ## Overview
//!
//! Given a subject, an action, a resource and an optional context, the engine
//! walks an ordered policy list and returns an allow or deny decision, a
//! human-readable reason, and the id of the policy that decided.
//!
//! ## Guarantees
//!
//! - **Default deny**: no matching policy means deny
//! - **Determinism**: list order is priority order, first match wins
//! - **Termination**: condition depth is bounded and evaluation is iterative
//! - **Fail closed**: malformed or over-deep conditions never grant access
//! - **No panics**: loading and writing return typed errors
//!
//! ## Example
//!
//! ```
//! use gatepdp::{evaluate, DecisionRequest, Policy, Resource, Subject};
//!
//! let policies: Vec<Policy> = serde_json::from_str(r#"[
//!     {
//!         "id": "owner-read",
//!         "description": "owners read their documents",
//!         "actions": ["document:read"],
//!         "abac": { "eq": ["${resource.ownerId}", "${subject.sub}"] }
//!     },
//!     { "id": "admin", "description": "admins", "actions": ["*"], "rbac": { "anyRole": ["admin"] } }
//! ]"#).expect("valid policies");
//!
//! let request = DecisionRequest::new(
//!     Subject::new("alice"),
//!     "document:read",
//!     Resource::new("document").with_attr("ownerId", "alice"),
//! );
//! let response = evaluate(&request, &policies);
//!
//! assert!(response.is_allow());
//! assert_eq!(response.matched_policy_id.as_deref(), Some("owner-read"));
//! assert_eq!(response.reason, "Matched owners read their documents");
//! ```
//!
//! ## Evaluation order
//!
//! For each policy, in list order:
//! 1. The action must be listed, or the policy lists `*`
//! 2. If the policy has `rbac`, the subject must hold one of `anyRole`
//! 3. If the policy has `abac`, the condition must hold
//! 4. The first policy passing all three decides (allow)
//! 5. Otherwise deny with `"No matching policy"`

mod audit;
mod condition;
mod engine;
mod error;
mod logic;
mod path;
mod policy;
mod repository;
mod stats;
mod target;
mod types;
mod value;

// Public API exports
pub use audit::{
    AuditEvent, AuditSink, JsonLinesAuditSink, MemoryAuditSink, TracingAuditSink, DECISION_EVENT,
};
pub use condition::{Condition, Operand, ABSOLUTE_MAX_CONDITION_DEPTH, DEFAULT_MAX_CONDITION_DEPTH};
pub use engine::{evaluate, DecisionPoint, Engine};
pub use error::{AuditError, ConditionError, PolicyError, RepositoryError};
pub use path::Path;
pub use policy::{validate_policies, Policy, PolicyBuilder, PolicyConfig};
pub use repository::{apply_create, apply_delete, apply_update, MemoryRepository, PolicyRepository};
pub use stats::EvaluationStats;
pub use target::{ActionScope, Rbac, WILDCARD};
pub use types::{
    Context, DecisionRequest, DecisionResponse, Resource, Subject, MATCHED_PREFIX,
    NO_MATCHING_POLICY,
};
pub use value::{Attributes, Value};
