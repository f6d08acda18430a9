//! Policy documents
//!
//! A document is either a bare list of policies or an object with a
//! `policies` list. Both JSON and YAML are accepted. Kept deliberately
//! simple - this is data, not behavior.

use std::path::Path;

use gatepdp::{validate_policies, Policy, PolicyConfig};
use serde::{Deserialize, Serialize};

use crate::loader::LoadError;

/// On-disk encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Guess from the file extension.
    pub fn from_path(path: &Path) -> Option<Format> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Top-level shape of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Layout {
    /// `[ {...}, {...} ]`
    List,
    /// `{ "policies": [ ... ] }`
    #[default]
    Wrapped,
}

/// A parsed, validated policy list plus the shape it was read in.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyDocument {
    pub layout: Layout,
    pub policies: Vec<Policy>,
}

#[derive(Serialize)]
struct Wrapped<'a> {
    policies: &'a [Policy],
}

impl PolicyDocument {
    pub fn new(layout: Layout, policies: Vec<Policy>) -> Self {
        PolicyDocument { layout, policies }
    }

    /// Parse and validate a document.
    ///
    /// Any structural problem or validation failure rejects the whole
    /// document; nothing is partially loaded.
    pub fn parse(contents: &str, format: Format, config: &PolicyConfig) -> Result<Self, LoadError> {
        // Go through a JSON tree so both encodings share one shape check.
        let tree: serde_json::Value = match format {
            Format::Json => serde_json::from_str(contents)?,
            Format::Yaml => serde_yaml::from_str(contents)?,
        };

        let (layout, list) = match tree {
            serde_json::Value::Array(list) => (Layout::List, serde_json::Value::Array(list)),
            serde_json::Value::Object(mut map) => match map.remove("policies") {
                Some(list) if map.is_empty() => (Layout::Wrapped, list),
                Some(_) => {
                    let extra: Vec<String> = map.keys().cloned().collect();
                    return Err(LoadError::Shape(format!(
                        "unexpected top-level keys: {}",
                        extra.join(", ")
                    )));
                }
                None => return Err(LoadError::Shape("missing `policies` list".into())),
            },
            serde_json::Value::Null => (Layout::Wrapped, serde_json::Value::Array(Vec::new())),
            other => {
                return Err(LoadError::Shape(format!(
                    "expected a list or an object, found {}",
                    json_type(&other)
                )))
            }
        };

        let policies: Vec<Policy> = serde_json::from_value(list)?;
        validate_policies(&policies, config)?;
        Ok(PolicyDocument { layout, policies })
    }

    /// Render in canonical form. `abacLogic` clauses come out as `abac`.
    pub fn render(&self, format: Format) -> Result<String, LoadError> {
        match (format, self.layout) {
            (Format::Json, Layout::List) => Ok(serde_json::to_string_pretty(&self.policies)? + "\n"),
            (Format::Json, Layout::Wrapped) => Ok(serde_json::to_string_pretty(&Wrapped {
                policies: &self.policies,
            })? + "\n"),
            (Format::Yaml, Layout::List) => Ok(serde_yaml::to_string(&self.policies)?),
            (Format::Yaml, Layout::Wrapped) => Ok(serde_yaml::to_string(&Wrapped {
                policies: &self.policies,
            })?),
        }
    }
}

fn json_type(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}
