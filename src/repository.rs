//! Policy storage interface.
//!
//! Every implementation must return policies in a stable, explicit order:
//! the order of `list()` is the evaluation priority. `create` appends,
//! `update` replaces in place.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RepositoryError;
use crate::policy::{validate_policies, Policy, PolicyConfig};

/// Ordered policy storage.
pub trait PolicyRepository: Send + Sync {
    /// All policies, in priority order.
    fn list(&self) -> Result<Vec<Policy>, RepositoryError>;

    fn get_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError>;

    /// Append a new policy at the lowest priority.
    fn create(&self, policy: Policy) -> Result<(), RepositoryError>;

    /// Replace the policy with the same id, keeping its position.
    fn update(&self, policy: Policy) -> Result<(), RepositoryError>;

    fn delete(&self, id: &str) -> Result<(), RepositoryError>;
}

impl<R: PolicyRepository + ?Sized> PolicyRepository for Arc<R> {
    fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
        (**self).list()
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError> {
        (**self).get_by_id(id)
    }

    fn create(&self, policy: Policy) -> Result<(), RepositoryError> {
        (**self).create(policy)
    }

    fn update(&self, policy: Policy) -> Result<(), RepositoryError> {
        (**self).update(policy)
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        (**self).delete(id)
    }
}

impl<R: PolicyRepository + ?Sized> PolicyRepository for &R {
    fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
        (**self).list()
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError> {
        (**self).get_by_id(id)
    }

    fn create(&self, policy: Policy) -> Result<(), RepositoryError> {
        (**self).create(policy)
    }

    fn update(&self, policy: Policy) -> Result<(), RepositoryError> {
        (**self).update(policy)
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        (**self).delete(id)
    }
}

/// Apply `create` to an ordered list, validating the result.
///
/// Shared by repositories so the ordering and validation rules are the same
/// everywhere.
pub fn apply_create(
    policies: &[Policy],
    policy: Policy,
    config: &PolicyConfig,
) -> Result<Vec<Policy>, RepositoryError> {
    if policies.iter().any(|p| p.id == policy.id) {
        return Err(RepositoryError::AlreadyExists(policy.id));
    }
    let mut next = policies.to_vec();
    next.push(policy);
    validate_policies(&next, config)?;
    Ok(next)
}

/// Apply `update` to an ordered list, validating the result.
pub fn apply_update(
    policies: &[Policy],
    policy: Policy,
    config: &PolicyConfig,
) -> Result<Vec<Policy>, RepositoryError> {
    let index = position(policies, &policy.id)?;
    let mut next = policies.to_vec();
    next[index] = policy;
    validate_policies(&next, config)?;
    Ok(next)
}

/// Apply `delete` to an ordered list.
pub fn apply_delete(policies: &[Policy], id: &str) -> Result<Vec<Policy>, RepositoryError> {
    let index = position(policies, id)?;
    let mut next = policies.to_vec();
    next.remove(index);
    Ok(next)
}

fn position(policies: &[Policy], id: &str) -> Result<usize, RepositoryError> {
    policies
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| RepositoryError::NotFound(id.to_owned()))
}

/// In-memory repository backed by an insertion-ordered list.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    policies: RwLock<Vec<Policy>>,
    config: PolicyConfig,
}

impl MemoryRepository {
    /// An empty repository.
    pub fn new(config: PolicyConfig) -> Self {
        MemoryRepository {
            policies: RwLock::new(Vec::new()),
            config,
        }
    }

    /// A repository seeded with an ordered list. The list is validated.
    pub fn from_policies(policies: Vec<Policy>, config: PolicyConfig) -> Result<Self, RepositoryError> {
        validate_policies(&policies, &config)?;
        Ok(MemoryRepository {
            policies: RwLock::new(policies),
            config,
        })
    }

    /// Replace the whole list at once. The list is validated first.
    pub fn replace_all(&self, policies: Vec<Policy>) -> Result<(), RepositoryError> {
        validate_policies(&policies, &self.config)?;
        *self.policies.write() = policies;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }
}

impl PolicyRepository for MemoryRepository {
    fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self.policies.read().clone())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.policies.read().iter().find(|p| p.id == id).cloned())
    }

    fn create(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut guard = self.policies.write();
        *guard = apply_create(&guard, policy, &self.config)?;
        Ok(())
    }

    fn update(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut guard = self.policies.write();
        *guard = apply_update(&guard, policy, &self.config)?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut guard = self.policies.write();
        *guard = apply_delete(&guard, id)?;
        Ok(())
    }
}
