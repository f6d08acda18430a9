//! Property tests for the decision semantics.
//!
//! Policy lists and requests are drawn from small pools so that matches,
//! near-misses and overlaps all show up often.

use gatepdp::{
    evaluate, ActionScope, Condition, DecisionRequest, DecisionResponse, Operand, Policy, Rbac,
    Resource, Subject, Value, NO_MATCHING_POLICY,
};
use proptest::prelude::*;
use serde_json::json;

const ACTIONS: &[&str] = &["doc:read", "doc:edit", "doc:delete", "padron:edit"];
const ROLES: &[&str] = &["admin", "editor", "ua", "viewer"];
const STATUSES: &[&str] = &["OPEN", "CLOSED", "DRAFT"];

fn arb_action() -> impl Strategy<Value = String> {
    prop::sample::select(ACTIONS).prop_map(str::to_owned)
}

fn arb_roles() -> impl Strategy<Value = Vec<String>> {
    prop::sample::subsequence(ROLES, 0..=ROLES.len())
        .prop_map(|roles| roles.into_iter().map(str::to_owned).collect())
}

fn arb_scope() -> impl Strategy<Value = ActionScope> {
    prop_oneof![
        1 => Just(ActionScope::any()),
        3 => prop::sample::subsequence(ACTIONS, 1..=2).prop_map(ActionScope::one_of),
    ]
}

fn arb_condition() -> impl Strategy<Value = Condition> {
    let leaf = prop_oneof![
        prop::sample::select(STATUSES).prop_map(|s| Condition::equals(
            Operand::path("resource.status").unwrap(),
            Operand::literal(s)
        )),
        prop::sample::select(STATUSES).prop_map(|s| Condition::not_equals(
            Operand::path("resource.status").unwrap(),
            Operand::literal(s)
        )),
        Just(Condition::includes(
            Operand::path("subject.uaIds").unwrap(),
            Operand::path("resource.uaId").unwrap()
        )),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..3).prop_map(Condition::all),
            prop::collection::vec(inner.clone(), 0..3).prop_map(Condition::any),
            inner.prop_map(Condition::negate),
        ]
    })
}

fn arb_policies() -> impl Strategy<Value = Vec<Policy>> {
    let body = (
        arb_scope(),
        prop::option::of(arb_roles()),
        prop::option::of(arb_condition()),
    );
    prop::collection::vec(body, 0..6).prop_map(|bodies| {
        bodies
            .into_iter()
            .enumerate()
            .map(|(i, (actions, roles, abac))| Policy {
                id: format!("p{i}"),
                description: format!("policy {i}"),
                actions,
                rbac: roles.map(Rbac::any_role),
                abac,
            })
            .collect()
    })
}

fn arb_request() -> impl Strategy<Value = DecisionRequest> {
    (
        arb_roles(),
        arb_action(),
        prop::sample::select(STATUSES),
        prop::sample::select(&["FCEyN", "FADU"][..]),
    )
        .prop_map(|(roles, action, status, ua)| {
            DecisionRequest::new(
                Subject::new("s1")
                    .with_roles(roles)
                    .with_attr("uaIds", vec!["FCEyN"]),
                action,
                Resource::new("padron")
                    .with_attr("status", status)
                    .with_attr("uaId", ua),
            )
        })
}

proptest! {
    #[test]
    fn prop_deterministic(policies in arb_policies(), request in arb_request()) {
        let first = evaluate(&request, &policies);
        for _ in 0..3 {
            prop_assert_eq!(&evaluate(&request, &policies), &first);
        }
    }

    #[test]
    fn prop_response_shape(policies in arb_policies(), request in arb_request()) {
        let response = evaluate(&request, &policies);
        match &response.matched_policy_id {
            Some(id) => {
                let policy = policies.iter().find(|p| &p.id == id).unwrap();
                prop_assert!(response.allow);
                prop_assert_eq!(response.reason, format!("Matched {}", policy.description));
            }
            None => {
                prop_assert!(!response.allow);
                prop_assert_eq!(response.reason, NO_MATCHING_POLICY);
            }
        }
    }

    #[test]
    fn prop_first_match_wins(policies in arb_policies(), request in arb_request()) {
        let expected = policies
            .iter()
            .find(|p| evaluate(&request, std::slice::from_ref(*p)).allow)
            .map(|p| p.id.clone());
        prop_assert_eq!(evaluate(&request, &policies).matched_policy_id, expected);
    }

    #[test]
    fn prop_empty_list_denies(request in arb_request()) {
        prop_assert_eq!(evaluate(&request, &[]), DecisionResponse::no_match());
    }

    #[test]
    fn prop_unconditional_wildcard_allows_everything(request in arb_request(), prefix in arb_policies()) {
        let catch_all = Policy::builder("catch-all").any_action().build().unwrap();
        let mut policies: Vec<Policy> = prefix;
        policies.push(catch_all);
        prop_assert!(evaluate(&request, &policies).allow);
    }

    #[test]
    fn prop_rbac_gate(required in arb_roles(), request in arb_request()) {
        let policy = Policy::builder("gated")
            .any_action()
            .any_role(required.clone())
            .build()
            .unwrap();
        let holds_one = required.is_empty() || required.iter().any(|r| request.subject.has_role(r));
        prop_assert_eq!(evaluate(&request, &[policy]).allow, holds_one);
    }

    #[test]
    fn prop_unlisted_action_never_matches(policies in arb_policies(), request in arb_request()) {
        let mut request = request;
        request.action = "never:listed".into();
        let response = evaluate(&request, &policies);
        if let Some(id) = response.matched_policy_id {
            let policy = policies.iter().find(|p| p.id == id).unwrap();
            prop_assert!(policy.actions.is_wildcard());
        }
    }

    #[test]
    fn prop_malformed_never_allows(request in arb_request(), wrap in 0usize..4, direct in any::<bool>()) {
        let raw = json!({ "startsWith": ["${resource.status}", "O"] });
        let mut condition = Condition::from_json(&raw);
        for _ in 0..wrap {
            condition = if direct {
                Condition::Not(Box::new(condition))
            } else {
                Condition::negate(condition)
            };
        }
        prop_assert!(condition.contains_malformed());
        let policy = Policy {
            id: "broken".into(),
            description: String::new(),
            actions: ActionScope::any(),
            rbac: None,
            abac: Some(condition),
        };
        prop_assert!(!evaluate(&request, &[policy]).allow);
    }

    #[test]
    fn prop_json_round_trip_preserves_decisions(policies in arb_policies(), request in arb_request()) {
        let text = serde_json::to_string(&policies).unwrap();
        let reparsed: Vec<Policy> = serde_json::from_str(&text).unwrap();
        prop_assert_eq!(evaluate(&request, &reparsed), evaluate(&request, &policies));
    }
}

#[test]
fn test_very_deep_condition_is_denied_without_overflow() {
    let mut condition = Condition::equals(Operand::literal(1i64), Operand::literal(1i64));
    for _ in 0..200_000 {
        condition = Condition::Not(Box::new(condition));
    }
    let policy = Policy {
        id: "deep".into(),
        description: String::new(),
        actions: ActionScope::any(),
        rbac: None,
        abac: Some(condition),
    };
    let request = DecisionRequest::new(Subject::new("u"), "x", Resource::new("r"));
    assert!(evaluate(&request, &[policy]).is_deny());
}

#[test]
fn test_deeply_nested_json_parses_to_malformed() {
    let mut raw = json!({ "eq": [1, 1] });
    for _ in 0..2_000 {
        raw = json!({ "all": [raw] });
    }
    let condition = Condition::from_json(&raw);
    assert!(condition.is_malformed() || condition.contains_malformed());
    assert!(!condition.evaluate(&Value::Null));
}
