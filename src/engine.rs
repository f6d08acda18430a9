//! Policy evaluation.
//!
//! Policies are tried in list order. For each one the action scope, the role
//! gate and the attribute condition must all pass; the first policy that
//! passes decides. If none does, the request is denied.
//!
//! List order is the priority order. There is no specificity ranking and no
//! deny-overrides step.

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::error::RepositoryError;
use crate::policy::{Policy, PolicyConfig};
use crate::repository::PolicyRepository;
use crate::stats::EvaluationStats;
use crate::types::{DecisionRequest, DecisionResponse};
use crate::value::Value;

/// Evaluates decision requests against ordered policy lists.
///
/// Holds no per-request state; one engine can serve concurrent callers.
#[derive(Debug, Clone)]
pub struct Engine<S = TracingAuditSink> {
    config: PolicyConfig,
    sink: S,
}

impl Default for Engine<TracingAuditSink> {
    fn default() -> Self {
        Engine::new(PolicyConfig::default())
    }
}

impl Engine<TracingAuditSink> {
    /// An engine that audits through `tracing`.
    pub fn new(config: PolicyConfig) -> Self {
        Engine {
            config,
            sink: TracingAuditSink,
        }
    }
}

impl<S: AuditSink> Engine<S> {
    /// An engine with a custom audit sink.
    pub fn with_sink(config: PolicyConfig, sink: S) -> Self {
        Engine { config, sink }
    }

    /// Limits applied during evaluation.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The audit sink receiving one record per decision.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Evaluate a request against an ordered policy list.
    pub fn evaluate(&self, request: &DecisionRequest, policies: &[Policy]) -> DecisionResponse {
        self.evaluate_with_stats(request, policies).0
    }

    /// Evaluate a request and report how much work it took.
    pub fn evaluate_with_stats(
        &self,
        request: &DecisionRequest,
        policies: &[Policy],
    ) -> (DecisionResponse, EvaluationStats) {
        let mut stats = EvaluationStats::new();
        let matched = self.first_match(request, policies, &mut stats);

        let response = match matched {
            Some(policy) => DecisionResponse::matched(&policy.id, &policy.description),
            None => DecisionResponse::no_match(),
        };
        tracing::debug!(
            user = %request.subject.sub,
            action = %request.action,
            allow = response.allow,
            policy_id = response.matched_policy_id.as_deref(),
            policies_checked = stats.policies_checked,
            "evaluated decision request"
        );

        self.audit(&AuditEvent::decision(request, &response, matched));
        (response, stats)
    }

    fn first_match<'p>(
        &self,
        request: &DecisionRequest,
        policies: &'p [Policy],
        stats: &mut EvaluationStats,
    ) -> Option<&'p Policy> {
        // Built on first use; most requests never reach an ABAC clause.
        let mut root: Option<Value> = None;

        for policy in policies {
            stats.inc_policies();

            if !policy.actions.matches(&request.action) {
                stats.inc_rejected_by_action();
                continue;
            }

            if let Some(rbac) = &policy.rbac {
                if !rbac.permits(&request.subject.roles) {
                    tracing::trace!(policy_id = %policy.id, "rbac filter rejected policy");
                    stats.inc_rejected_by_rbac();
                    continue;
                }
            }

            if let Some(condition) = &policy.abac {
                let context = root.get_or_insert_with(|| request.to_value());
                if !condition.evaluate_with(context, self.config.max_condition_depth, stats) {
                    tracing::trace!(policy_id = %policy.id, "abac filter rejected policy");
                    stats.inc_rejected_by_abac();
                    continue;
                }
            }

            return Some(policy);
        }
        None
    }

    fn audit(&self, event: &AuditEvent) {
        if let Err(error) = self.sink.record(event) {
            tracing::warn!(%error, user = %event.user, "dropping audit record");
        }
    }
}

/// Evaluate with the default engine.
pub fn evaluate(request: &DecisionRequest, policies: &[Policy]) -> DecisionResponse {
    Engine::new(PolicyConfig::default()).evaluate(request, policies)
}

/// A decision point bound to a policy repository.
///
/// Fetches the ordered policy list on every call and evaluates it. The
/// repository owns caching and read consistency.
pub struct DecisionPoint<R, S = TracingAuditSink> {
    repository: R,
    engine: Engine<S>,
}

impl<R: PolicyRepository> DecisionPoint<R, TracingAuditSink> {
    /// A decision point with the default engine.
    pub fn new(repository: R) -> Self {
        DecisionPoint {
            repository,
            engine: Engine::new(PolicyConfig::default()),
        }
    }
}

impl<R: PolicyRepository, S: AuditSink> DecisionPoint<R, S> {
    /// A decision point with a configured engine.
    pub fn with_engine(repository: R, engine: Engine<S>) -> Self {
        DecisionPoint { repository, engine }
    }

    /// The backing repository, for policy administration.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// The engine used for each decision.
    pub fn engine(&self) -> &Engine<S> {
        &self.engine
    }

    /// Fetch the current policies and decide.
    ///
    /// A repository failure is returned as-is; nothing is evaluated or audited.
    pub fn decide(&self, request: &DecisionRequest) -> Result<DecisionResponse, RepositoryError> {
        let policies = self.repository.list()?;
        Ok(self.engine.evaluate(request, &policies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditSink;
    use crate::condition::Condition;
    use crate::error::AuditError;
    use crate::repository::MemoryRepository;
    use crate::types::{Resource, Subject, NO_MATCHING_POLICY};
    use serde_json::json;

    fn policies(json: serde_json::Value) -> Vec<Policy> {
        serde_json::from_value(json).unwrap()
    }

    fn padron_policies() -> Vec<Policy> {
        policies(json!([
            {
                "id": "p1",
                "description": "UA staff edit open rosters",
                "actions": ["padron:edit"],
                "rbac": { "anyRole": ["ua"] },
                "abac": { "all": [
                    { "eq": ["${resource.status}", "OPEN"] },
                    { "includes": ["${subject.uaIds}", "${resource.uaId}"] }
                ]}
            },
            { "id": "p2", "description": "admins", "actions": ["*"], "rbac": { "anyRole": ["admin"] } }
        ]))
    }

    fn padron_request(roles: &[&str], status: &str) -> DecisionRequest {
        DecisionRequest::new(
            Subject::new("s1")
                .with_roles(roles.iter().copied())
                .with_attr("uaIds", vec!["FCEyN"]),
            "padron:edit",
            Resource::new("padron")
                .with_attr("uaId", "FCEyN")
                .with_attr("status", status),
        )
    }

    fn engine() -> Engine<MemoryAuditSink> {
        Engine::with_sink(PolicyConfig::default(), MemoryAuditSink::new())
    }

    #[test]
    fn test_allow_via_rbac_and_abac() {
        let response = engine().evaluate(&padron_request(&["ua"], "OPEN"), &padron_policies());
        assert!(response.allow);
        assert_eq!(response.matched_policy_id.as_deref(), Some("p1"));
        assert_eq!(response.reason, "Matched UA staff edit open rosters");
    }

    #[test]
    fn test_deny_on_status_mismatch() {
        let response = engine().evaluate(&padron_request(&["ua"], "CLOSED"), &padron_policies());
        assert_eq!(response, DecisionResponse::no_match());
        assert_eq!(response.reason, NO_MATCHING_POLICY);
    }

    #[test]
    fn test_admin_falls_through_to_wildcard() {
        let response = engine().evaluate(&padron_request(&["admin"], "CLOSED"), &padron_policies());
        assert_eq!(response.matched_policy_id.as_deref(), Some("p2"));

        let other = DecisionRequest::new(
            Subject::new("root").with_roles(["admin"]),
            "anything:at-all",
            Resource::new("whatever"),
        );
        let response = engine().evaluate(&other, &padron_policies());
        assert_eq!(response.matched_policy_id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_empty_policy_list() {
        let response = engine().evaluate(&padron_request(&["ua"], "OPEN"), &[]);
        assert_eq!(
            response,
            DecisionResponse {
                allow: false,
                reason: "No matching policy".into(),
                matched_policy_id: None,
            }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let list = policies(json!([
            { "id": "first", "description": "a", "actions": ["*"] },
            { "id": "second", "description": "b", "actions": ["*"] }
        ]));
        let request = padron_request(&[], "OPEN");
        assert_eq!(
            engine().evaluate(&request, &list).matched_policy_id.as_deref(),
            Some("first")
        );

        let reversed: Vec<Policy> = list.into_iter().rev().collect();
        assert_eq!(
            engine().evaluate(&request, &reversed).matched_policy_id.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_empty_any_role_is_unrestricted() {
        let list = policies(json!([
            { "id": "open", "actions": ["padron:edit"], "rbac": { "anyRole": [] } }
        ]));
        let response = engine().evaluate(&padron_request(&[], "OPEN"), &list);
        assert_eq!(response.matched_policy_id.as_deref(), Some("open"));
    }

    #[test]
    fn test_malformed_condition_never_matches() {
        let list = policies(json!([
            { "id": "broken", "actions": ["*"], "abac": { "gt": ["${resource.size}", 1] } },
            { "id": "fallback", "actions": ["*"] }
        ]));
        let response = engine().evaluate(&padron_request(&[], "OPEN"), &list);
        assert_eq!(response.matched_policy_id.as_deref(), Some("fallback"));
    }

    #[test]
    fn test_too_deep_condition_never_matches() {
        let mut condition = Condition::all(vec![]);
        for _ in 0..10 {
            condition = Condition::all(vec![condition]);
        }
        let policy = Policy {
            id: "deep".into(),
            description: String::new(),
            actions: crate::target::ActionScope::any(),
            rbac: None,
            abac: Some(condition),
        };
        let shallow = PolicyConfig { max_condition_depth: 4, ..PolicyConfig::default() };
        let engine = Engine::with_sink(shallow, MemoryAuditSink::new());
        assert!(engine.evaluate(&padron_request(&[], "OPEN"), &[policy.clone()]).is_deny());

        let roomy = Engine::with_sink(PolicyConfig::default(), MemoryAuditSink::new());
        assert!(roomy.evaluate(&padron_request(&[], "OPEN"), &[policy]).is_allow());
    }

    #[test]
    fn test_stats() {
        let (_, stats) = engine().evaluate_with_stats(&padron_request(&["admin"], "OPEN"), &padron_policies());
        assert_eq!(stats.policies_checked, 2);
        assert_eq!(stats.rejected_by_rbac, 1);
        assert_eq!(stats.condition_evals, 0);

        let (_, stats) = engine().evaluate_with_stats(&padron_request(&["ua"], "CLOSED"), &padron_policies());
        assert_eq!(stats.policies_checked, 2);
        assert_eq!(stats.rejected_by_abac, 1);
        assert_eq!(stats.rejected_by_rbac, 1);
        assert_eq!(stats.max_depth_reached, 2);

        let mut request = padron_request(&["ua"], "OPEN");
        request.action = "padron:view".into();
        let (_, stats) = engine().evaluate_with_stats(&request, &padron_policies());
        assert_eq!(stats.rejected_by_action, 1);
    }

    #[test]
    fn test_one_audit_event_per_call() {
        let engine = engine();
        engine.evaluate(&padron_request(&["ua"], "OPEN"), &padron_policies());
        engine.evaluate(&padron_request(&["ua"], "CLOSED"), &padron_policies());
        engine.evaluate(&padron_request(&["ua"], "OPEN"), &[]);

        let events = engine.sink().events();
        assert_eq!(events.len(), 3);
        assert!(events[0].allow);
        assert_eq!(events[0].policy_id.as_deref(), Some("p1"));
        assert_eq!(events[0].policy_description.as_deref(), Some("UA staff edit open rosters"));
        assert_eq!(events[0].resource_type, "padron");
        assert_eq!(events[0].user, "s1");
        assert!(!events[1].allow);
        assert!(events[1].policy_id.is_none());
        assert_eq!(events[2].reason, "No matching policy");
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _event: &AuditEvent) -> Result<(), AuditError> {
            Err(AuditError::Unavailable("sink offline".into()))
        }
    }

    #[test]
    fn test_audit_failure_does_not_change_decision() {
        let failing = Engine::with_sink(PolicyConfig::default(), FailingSink);
        let request = padron_request(&["ua"], "OPEN");
        assert_eq!(
            failing.evaluate(&request, &padron_policies()),
            engine().evaluate(&request, &padron_policies())
        );
    }

    #[test]
    fn test_free_function() {
        let response = evaluate(&padron_request(&["ua"], "OPEN"), &padron_policies());
        assert_eq!(response.matched_policy_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_decision_point() {
        let repo = MemoryRepository::from_policies(padron_policies(), PolicyConfig::default()).unwrap();
        let pdp = DecisionPoint::new(repo);
        let response = pdp.decide(&padron_request(&["ua"], "OPEN")).unwrap();
        assert_eq!(response.matched_policy_id.as_deref(), Some("p1"));

        pdp.repository().delete("p1").unwrap();
        let response = pdp.decide(&padron_request(&["ua"], "OPEN")).unwrap();
        assert!(response.is_deny());
    }

    struct OfflineRepository;

    impl PolicyRepository for OfflineRepository {
        fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
            Err(RepositoryError::Storage("offline".into()))
        }
        fn get_by_id(&self, _id: &str) -> Result<Option<Policy>, RepositoryError> {
            Err(RepositoryError::Storage("offline".into()))
        }
        fn create(&self, _policy: Policy) -> Result<(), RepositoryError> {
            Err(RepositoryError::Storage("offline".into()))
        }
        fn update(&self, _policy: Policy) -> Result<(), RepositoryError> {
            Err(RepositoryError::Storage("offline".into()))
        }
        fn delete(&self, _id: &str) -> Result<(), RepositoryError> {
            Err(RepositoryError::Storage("offline".into()))
        }
    }

    #[test]
    fn test_decision_point_surfaces_repository_errors() {
        let sink = MemoryAuditSink::new();
        let pdp = DecisionPoint::with_engine(
            OfflineRepository,
            Engine::with_sink(PolicyConfig::default(), &sink),
        );
        let err = pdp.decide(&padron_request(&["ua"], "OPEN")).unwrap_err();
        assert!(matches!(err, RepositoryError::Storage(_)));
        assert!(sink.is_empty());
    }
}
