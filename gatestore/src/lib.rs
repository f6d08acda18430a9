//! gatestore: policy documents and file-backed storage for gatepdp.
//!
//! Parses JSON and YAML policy documents, validates them as a whole, and
//! exposes a [`FileRepository`] that plugs into [`gatepdp::DecisionPoint`].

pub mod cli;
pub mod config;
pub mod document;
pub mod file_repo;
pub mod loader;

pub use config::{ConfigError, StoreConfig};
pub use document::{Format, Layout, PolicyDocument};
pub use file_repo::FileRepository;
pub use loader::{load_policy_file, save_policy_file, LoadError};
