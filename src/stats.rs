//! Evaluation statistics for observable bound usage.
//!
//! This module provides the `EvaluationStats` struct which records how a
//! single evaluation walked the policy list and how deep its conditions went.

use serde::Serialize;

/// Observable work done during one `evaluate_with_stats()` call.
///
/// All counters saturate instead of overflowing. The struct is `Copy` to
/// allow cheap cloning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    /// Number of policies examined before reaching a decision.
    ///
    /// First-match-wins stops early, so this is less than the list length
    /// whenever a policy matched before the end.
    pub policies_checked: u16,

    /// Policies skipped because their action scope did not cover the request.
    pub rejected_by_action: u16,

    /// Policies skipped because the subject held none of the required roles.
    pub rejected_by_rbac: u16,

    /// Policies skipped because their condition did not hold.
    pub rejected_by_abac: u16,

    /// Deepest condition level reached.
    ///
    /// Compare against `PolicyConfig::max_condition_depth` to see how close
    /// an evaluation got to the limit.
    pub max_depth_reached: u8,

    /// Total number of condition nodes evaluated.
    pub condition_evals: u16,
}

impl EvaluationStats {
    /// Create a new stats tracker initialized to zero.
    #[inline]
    pub const fn new() -> Self {
        EvaluationStats {
            policies_checked: 0,
            rejected_by_action: 0,
            rejected_by_rbac: 0,
            rejected_by_abac: 0,
            max_depth_reached: 0,
            condition_evals: 0,
        }
    }

    #[inline]
    pub fn inc_policies(&mut self) {
        self.policies_checked = self.policies_checked.saturating_add(1);
    }

    #[inline]
    pub fn inc_rejected_by_action(&mut self) {
        self.rejected_by_action = self.rejected_by_action.saturating_add(1);
    }

    #[inline]
    pub fn inc_rejected_by_rbac(&mut self) {
        self.rejected_by_rbac = self.rejected_by_rbac.saturating_add(1);
    }

    #[inline]
    pub fn inc_rejected_by_abac(&mut self) {
        self.rejected_by_abac = self.rejected_by_abac.saturating_add(1);
    }

    /// Update the max depth if current depth is higher.
    #[inline]
    pub fn update_depth(&mut self, depth: usize) {
        let depth = u8::try_from(depth).unwrap_or(u8::MAX);
        if depth > self.max_depth_reached {
            self.max_depth_reached = depth;
        }
    }

    /// Increment the condition evaluation counter.
    #[inline]
    pub fn inc_condition_evals(&mut self) {
        self.condition_evals = self.condition_evals.saturating_add(1);
    }
}
