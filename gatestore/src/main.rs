use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatepdp::{DecisionRequest, DecisionResponse, Engine, EvaluationStats};
use gatestore::cli::{resolve, Resolved, Source, Translate};
use gatestore::{load_policy_file, save_policy_file, Format, Layout, StoreConfig};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// gatestore -- policy files for the gatepdp decision point.
#[derive(Parser, Debug)]
#[command(name = "gatestore", version, about)]
struct Cli {
    /// Store config file (YAML or JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate a policy file
    Check {
        #[command(flatten)]
        source: Source,
    },

    /// Evaluate one decision request and print the response as JSON
    Eval {
        #[command(flatten)]
        source: Source,

        /// Request file, or `-` for stdin
        #[arg(long, default_value = "-")]
        request: PathBuf,

        /// Also print evaluation statistics
        #[arg(long)]
        stats: bool,
    },

    /// Rewrite a policy file in canonical form, optionally in another format
    Translate {
        /// Policy file to read
        #[arg(long)]
        input: PathBuf,

        /// Input format; guessed from the extension if omitted
        #[arg(long, value_enum)]
        from: Option<Format>,

        /// Output format; defaults to the output file's extension, then the input format
        #[arg(long, value_enum)]
        to: Option<Format>,

        /// Top-level shape of the output; defaults to the input shape
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Output file; stdout if omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let store = cli
        .config
        .as_deref()
        .map(StoreConfig::load)
        .transpose()
        .context("loading store config")?;

    match cli.command {
        Commands::Check { source } => check(store.as_ref(), source),
        Commands::Eval {
            source,
            request,
            stats,
        } => eval(store.as_ref(), source, &request, stats),
        Commands::Translate {
            input,
            from,
            to,
            layout,
            output,
        } => translate(store.as_ref(), &input, from, to, layout, output.as_deref()),
    }
}

fn check(store: Option<&StoreConfig>, source: Source) -> anyhow::Result<()> {
    let Resolved {
        policies: path,
        format,
        engine,
    } = resolve(store, source)?;
    let doc = load_policy_file(&path, format, &engine)
        .with_context(|| format!("checking {}", path.display()))?;

    let conditional = doc.policies.iter().filter(|p| p.abac.is_some()).count();
    println!(
        "{}: {} policies OK ({} with conditions)",
        path.display(),
        doc.policies.len(),
        conditional
    );
    Ok(())
}

fn eval(store: Option<&StoreConfig>, source: Source, request: &Path, stats: bool) -> anyhow::Result<()> {
    let Resolved {
        policies: path,
        format,
        engine: config,
    } = resolve(store, source)?;
    let doc = load_policy_file(&path, format, &config)
        .with_context(|| format!("loading {}", path.display()))?;

    let raw = if request == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(request)
            .with_context(|| format!("reading request {}", request.display()))?
    };
    let request: DecisionRequest = serde_json::from_str(&raw).context("parsing decision request")?;

    let engine = Engine::new(config);
    let (response, evaluation) = engine.evaluate_with_stats(&request, &doc.policies);

    let out = if stats {
        serde_json::to_string_pretty(&WithStats {
            response: &response,
            stats: evaluation,
        })?
    } else {
        serde_json::to_string_pretty(&response)?
    };
    println!("{out}");
    Ok(())
}

#[derive(Serialize)]
struct WithStats<'a> {
    response: &'a DecisionResponse,
    stats: EvaluationStats,
}

fn translate(
    store: Option<&StoreConfig>,
    input: &Path,
    from: Option<Format>,
    to: Option<Format>,
    layout: Option<Layout>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let config = store.map(|s| s.engine).unwrap_or_default();
    let options = Translate {
        from,
        to,
        layout,
        output,
    };
    let (doc, target_format) = gatestore::cli::translate(input, &options, &config)?;

    match output {
        Some(path) => {
            save_policy_file(path, &doc, target_format)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(
                input = %input.display(),
                output = %path.display(),
                policies = doc.policies.len(),
                "translated policy file"
            );
        }
        None => print!("{}", doc.render(target_format)?),
    }
    Ok(())
}
