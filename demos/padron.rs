//! Illustrative scenario: university roster editing.
//!
//! This demo walks the classic RBAC + ABAC combination:
//! 1. Academic-unit staff edit rosters of their own unit, while open.
//! 2. Admins do anything.
//! 3. Everything else is denied by default.
//!
//! Run with `RUST_LOG=info` to see the audit records.

use gatepdp::{
    DecisionPoint, DecisionRequest, MemoryRepository, Policy, PolicyConfig, PolicyRepository,
    Resource, Subject,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    // 1. Define the policies, in priority order
    let policies: Vec<Policy> = serde_json::from_str(
        r#"[
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
        ]"#,
    )?;
    let repo = MemoryRepository::from_policies(policies, PolicyConfig::default())?;
    let pdp = DecisionPoint::new(repo);

    println!("--- gatepdp roster example ---");

    let staff = Subject::new("s1")
        .with_roles(["ua"])
        .with_attr("uaIds", vec!["FCEyN"]);
    let roster = |status: &str| {
        Resource::new("padron")
            .with_attr("uaId", "FCEyN")
            .with_attr("status", status)
    };

    // Scenario A: staff edit an open roster of their unit
    let a = pdp.decide(&DecisionRequest::new(staff.clone(), "padron:edit", roster("OPEN")))?;
    println!("Staff edit OPEN roster:   allow={} ({})", a.allow, a.reason);
    assert!(a.is_allow());

    // Scenario B: the roster is closed
    let b = pdp.decide(&DecisionRequest::new(staff.clone(), "padron:edit", roster("CLOSED")))?;
    println!("Staff edit CLOSED roster: allow={} ({})", b.allow, b.reason);
    assert!(b.is_deny());

    // Scenario C: an admin falls through to the wildcard policy
    let admin = Subject::new("root").with_roles(["admin"]);
    let c = pdp.decide(&DecisionRequest::new(admin, "padron:delete", roster("CLOSED")))?;
    println!("Admin delete roster:      allow={} ({})", c.allow, c.reason);
    assert_eq!(c.matched_policy_id.as_deref(), Some("p2"));

    // Scenario D: policies change at runtime; the next decision sees it
    pdp.repository().delete("p1")?;
    let d = pdp.decide(&DecisionRequest::new(staff, "padron:edit", roster("OPEN")))?;
    println!("Staff edit after removal: allow={} ({})", d.allow, d.reason);
    assert!(d.is_deny());

    Ok(())
}
