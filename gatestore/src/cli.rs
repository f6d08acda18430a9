//! Pieces of the `gatestore` command line that do not touch stdio.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use gatepdp::PolicyConfig;

use crate::config::StoreConfig;
use crate::document::{Format, Layout, PolicyDocument};
use crate::loader::{load_policy_file, resolve_format};

/// Where to read policies from, as given on the command line.
#[derive(Args, Debug, Default, Clone)]
pub struct Source {
    /// Policy file; overrides the config
    #[arg(long)]
    pub policies: Option<PathBuf>,

    /// Policy file format; guessed from the extension if omitted
    #[arg(long, value_enum)]
    pub format: Option<Format>,
}

/// A policy source after merging flags with the store config.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub policies: PathBuf,
    pub format: Option<Format>,
    pub engine: PolicyConfig,
}

/// Command-line flags win over the config file.
pub fn resolve(store: Option<&StoreConfig>, source: Source) -> anyhow::Result<Resolved> {
    let policies = source
        .policies
        .or_else(|| store.map(|s| s.policies.clone()))
        .context("no policy file: pass --policies or --config")?;
    let format = source.format.or_else(|| store.and_then(|s| s.format));
    let engine = store.map(|s| s.engine).unwrap_or_default();
    Ok(Resolved {
        policies,
        format,
        engine,
    })
}

/// Output format: `--to`, else the output file's extension, else the input format.
pub fn output_format(to: Option<Format>, output: Option<&Path>, input: Format) -> Format {
    to.or_else(|| output.and_then(Format::from_path)).unwrap_or(input)
}

/// Options for `gatestore translate`.
#[derive(Debug, Clone, Default)]
pub struct Translate<'a> {
    pub from: Option<Format>,
    pub to: Option<Format>,
    pub layout: Option<Layout>,
    pub output: Option<&'a Path>,
}

/// Load `input` and re-shape it in canonical form.
///
/// Conditions written as `abacLogic` come out as canonical `abac`.
pub fn translate(
    input: &Path,
    options: &Translate<'_>,
    config: &PolicyConfig,
) -> anyhow::Result<(PolicyDocument, Format)> {
    let doc = load_policy_file(input, options.from, config)
        .with_context(|| format!("loading {}", input.display()))?;
    let source_format = resolve_format(input, options.from)?;
    let target_format = output_format(options.to, options.output, source_format);
    let layout = options.layout.unwrap_or(doc.layout);
    Ok((PolicyDocument::new(layout, doc.policies), target_format))
}
