//! Policy file loader
//!
//! Reads and writes policy documents on disk. Writes go to a sibling temp
//! file that is renamed over the target, so readers never see a torn file.

use std::io::Write;
use std::path::{Path, PathBuf};

use gatepdp::{PolicyConfig, PolicyError};

use crate::document::{Format, PolicyDocument};

/// Failure to load or persist a policy document.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unexpected document shape: {0}")]
    Shape(String),

    #[error("cannot tell the format of {}; use a .json, .yaml or .yml extension", .0.display())]
    UnknownFormat(PathBuf),

    #[error(transparent)]
    Invalid(#[from] PolicyError),
}

impl LoadError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Pick the explicit format, or guess from the extension.
pub fn resolve_format(path: &Path, format: Option<Format>) -> Result<Format, LoadError> {
    format
        .or_else(|| Format::from_path(path))
        .ok_or_else(|| LoadError::UnknownFormat(path.to_path_buf()))
}

/// Load and validate a policy file.
pub fn load_policy_file(
    path: &Path,
    format: Option<Format>,
    config: &PolicyConfig,
) -> Result<PolicyDocument, LoadError> {
    let format = resolve_format(path, format)?;
    let contents = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let doc = PolicyDocument::parse(&contents, format, config)?;
    tracing::debug!(path = %path.display(), policies = doc.policies.len(), "loaded policy file");
    Ok(doc)
}

/// Render a document and write it atomically.
pub fn save_policy_file(path: &Path, doc: &PolicyDocument, format: Format) -> Result<(), LoadError> {
    let rendered = doc.render(format)?;
    write_atomic(path, rendered.as_bytes())?;
    tracing::debug!(path = %path.display(), policies = doc.policies.len(), "saved policy file");
    Ok(())
}

/// Write `contents` to a temp file next to `path`, then rename it into place.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), LoadError> {
    let tmp = temp_path(path);
    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        std::fs::rename(&tmp, path)
    })();

    if let Err(e) = result {
        // Best effort cleanup.
        let _ = std::fs::remove_file(&tmp);
        return Err(LoadError::io(path, e));
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "policies".to_owned());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Layout;
    use gatepdp::Policy;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_load_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json = dir.path().join("policies.json");
        std::fs::write(&json, r#"[{ "id": "a", "actions": ["*"] }]"#).unwrap();
        let yaml = dir.path().join("policies.yml");
        std::fs::write(&yaml, "policies:\n  - id: a\n    actions: ['*']\n").unwrap();

        let config = PolicyConfig::default();
        let from_json = load_policy_file(&json, None, &config).unwrap();
        let from_yaml = load_policy_file(&yaml, None, &config).unwrap();
        assert_eq!(from_json.policies, from_yaml.policies);
        assert_eq!(from_json.layout, Layout::List);
        assert_eq!(from_yaml.layout, Layout::Wrapped);
    }

    #[test]
    fn test_explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.txt");
        std::fs::write(&path, "- id: a\n  actions: ['*']\n").unwrap();

        let config = PolicyConfig::default();
        assert!(matches!(
            load_policy_file(&path, None, &config),
            Err(LoadError::UnknownFormat(_))
        ));
        let doc = load_policy_file(&path, Some(Format::Yaml), &config).unwrap();
        assert_eq!(doc.policies[0].id, "a");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let err = load_policy_file(&path, None, &PolicyConfig::default()).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");
        let doc = PolicyDocument::new(
            Layout::List,
            vec![Policy::builder("a").description("all").any_action().build().unwrap()],
        );
        save_policy_file(&path, &doc, Format::Yaml).unwrap();

        let loaded = load_policy_file(&path, None, &PolicyConfig::default()).unwrap();
        assert_eq!(loaded, doc);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("out.yaml")]);
    }

    #[test]
    fn test_write_atomic_into_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no/such/dir/p.json");
        assert!(matches!(write_atomic(&path, b"[]"), Err(LoadError::Io { .. })));
    }
}
