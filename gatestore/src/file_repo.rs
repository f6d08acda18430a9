//! File-backed policy repository.
//!
//! The whole document is held in memory. Every write is validated, persisted
//! atomically, and only then made visible to readers.

use std::path::{Path, PathBuf};

use gatepdp::{
    apply_create, apply_delete, apply_update, Policy, PolicyConfig, PolicyRepository,
    RepositoryError,
};
use parking_lot::RwLock;

use crate::document::{Format, PolicyDocument};
use crate::loader::{load_policy_file, resolve_format, save_policy_file, LoadError};

#[derive(Debug)]
pub struct FileRepository {
    path: PathBuf,
    format: Format,
    config: PolicyConfig,
    doc: RwLock<PolicyDocument>,
}

impl FileRepository {
    /// Open an existing policy file. The file is validated as a whole.
    pub fn open(path: impl Into<PathBuf>, format: Option<Format>, config: PolicyConfig) -> Result<Self, LoadError> {
        let path = path.into();
        let format = resolve_format(&path, format)?;
        let doc = load_policy_file(&path, Some(format), &config)?;
        tracing::info!(path = %path.display(), policies = doc.policies.len(), "opened policy repository");
        Ok(FileRepository {
            path,
            format,
            config,
            doc: RwLock::new(doc),
        })
    }

    /// Create a new, empty policy file and open it. Fails if the file exists.
    pub fn create_new(path: impl Into<PathBuf>, format: Option<Format>, config: PolicyConfig) -> Result<Self, LoadError> {
        let path = path.into();
        let format = resolve_format(&path, format)?;
        if path.exists() {
            return Err(LoadError::Io {
                path,
                source: std::io::ErrorKind::AlreadyExists.into(),
            });
        }
        let doc = PolicyDocument::new(Default::default(), Vec::new());
        save_policy_file(&path, &doc, format)?;
        Ok(FileRepository {
            path,
            format,
            config,
            doc: RwLock::new(doc),
        })
    }

    /// Re-read the file. On failure the previous contents stay in effect.
    pub fn reload(&self) -> Result<usize, LoadError> {
        let doc = load_policy_file(&self.path, Some(self.format), &self.config)?;
        let count = doc.policies.len();
        *self.doc.write() = doc;
        tracing::info!(path = %self.path.display(), policies = count, "reloaded policy repository");
        Ok(count)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    fn commit(&self, doc: &mut PolicyDocument, policies: Vec<Policy>) -> Result<(), RepositoryError> {
        let next = PolicyDocument::new(doc.layout, policies);
        save_policy_file(&self.path, &next, self.format)
            .map_err(|e| RepositoryError::Storage(e.to_string()))?;
        *doc = next;
        Ok(())
    }
}

impl PolicyRepository for FileRepository {
    fn list(&self) -> Result<Vec<Policy>, RepositoryError> {
        Ok(self.doc.read().policies.clone())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<Policy>, RepositoryError> {
        Ok(self.doc.read().policies.iter().find(|p| p.id == id).cloned())
    }

    fn create(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut doc = self.doc.write();
        let next = apply_create(&doc.policies, policy, &self.config)?;
        self.commit(&mut doc, next)
    }

    fn update(&self, policy: Policy) -> Result<(), RepositoryError> {
        let mut doc = self.doc.write();
        let next = apply_update(&doc.policies, policy, &self.config)?;
        self.commit(&mut doc, next)
    }

    fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let mut doc = self.doc.write();
        let next = apply_delete(&doc.policies, id)?;
        self.commit(&mut doc, next)
    }
}
