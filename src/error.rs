//! Error types.
//!
//! Evaluation itself never fails: these errors describe problems found while
//! loading, validating or storing policies, and problems in the audit side
//! channel that the engine swallows.

/// A problem with a single condition tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    /// The tree nests deeper than the configured limit.
    #[error("condition nesting too deep: {actual} levels (max {max})")]
    TooDeep { max: usize, actual: usize },

    /// A node could not be understood.
    #[error("malformed condition: {0}")]
    Malformed(String),

    /// A literal or path exceeds the configured string length.
    #[error("string too long: {actual} bytes (max {max})")]
    StringTooLong { max: usize, actual: usize },

    /// The evaluation stack ended in an impossible state.
    #[error("internal evaluation error")]
    Internal,
}

/// A policy or policy list failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("policy at position {index} has an empty id")]
    EmptyId { index: usize },

    #[error("duplicate policy id `{id}`")]
    DuplicateId { id: String },

    #[error("policy `{id}` has no actions")]
    EmptyActions { id: String },

    #[error("policy `{id}` sets both `abac` and `abacLogic`")]
    ConflictingConditions { id: String },

    #[error("policy `{id}` has an invalid condition: {source}")]
    InvalidCondition {
        id: String,
        #[source]
        source: ConditionError,
    },

    #[error("policy `{id}`: string too long: {actual} bytes (max {max})")]
    StringTooLong { id: String, max: usize, actual: usize },

    #[error("too many policies: {actual} (max {max})")]
    TooManyPolicies { max: usize, actual: usize },
}

/// Errors raised by a policy repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("policy `{0}` not found")]
    NotFound(String),

    #[error("policy `{0}` already exists")]
    AlreadyExists(String),

    #[error(transparent)]
    Invalid(#[from] PolicyError),

    #[error("policy storage error: {0}")]
    Storage(String),
}

/// Errors raised by an audit sink. The engine logs and drops these.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_messages() {
        let err = PolicyError::InvalidCondition {
            id: "p1".into(),
            source: ConditionError::TooDeep { max: 32, actual: 40 },
        };
        assert_eq!(
            err.to_string(),
            "policy `p1` has an invalid condition: condition nesting too deep: 40 levels (max 32)"
        );
        assert_eq!(
            PolicyError::DuplicateId { id: "p2".into() }.to_string(),
            "duplicate policy id `p2`"
        );
    }

    #[test]
    fn test_repository_error_from_policy_error() {
        let err: RepositoryError = PolicyError::EmptyActions { id: "x".into() }.into();
        assert!(matches!(err, RepositoryError::Invalid(_)));
        assert_eq!(err.to_string(), "policy `x` has no actions");
    }
}
