// Copyright 2026 Oxide Computer Company

//! Captures one external source into an internal git repository and prints
//! the result as JSON.
//!
//! Logs go to stderr and are filtered by `RUST_LOG` (default `info`).

#![deny(missing_docs)]

use anyhow::{Context, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::Utf8PathBuf;
use clap::Parser;
use fs_err as fs;
use source_capture::{
    AdjustProvider, CaptureConfig, CommandAdjuster, Ingestor,
    StaticRepoProvider,
};
use source_capture_types::{PullSpec, SourceType};
use std::io::Write;
use tracing_subscriber::EnvFilter;

/// Capture a git ref or source archive into an internal repository.
#[derive(Parser, Debug)]
#[command(name = "source-capture")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Read the pull spec from a JSON file instead of flags
    #[arg(long, conflicts_with_all = ["name", "source_type", "url", "reference"])]
    spec: Option<Utf8PathBuf>,

    /// Logical name of the internal repository
    #[arg(long, required_unless_present = "spec")]
    name: Option<String>,

    /// Source type: git or archive
    #[arg(long = "type", required_unless_present = "spec")]
    source_type: Option<SourceType>,

    /// External git URL or archive URL
    #[arg(long, required_unless_present = "spec")]
    url: Option<String>,

    /// Git branch, tag or commit (defaults to the remote's HEAD)
    #[arg(long = "ref")]
    reference: Option<String>,

    /// Run the adjust step after the pull commit
    #[arg(long)]
    adjust: bool,

    /// Internal repository URL to push to
    #[arg(long, env = "SOURCE_CAPTURE_INTERNAL_URL")]
    internal_url: String,

    /// URL reported to consumers (defaults to --internal-url)
    #[arg(long, env = "SOURCE_CAPTURE_INTERNAL_READ_ONLY_URL", default_value = "")]
    internal_read_only_url: String,

    /// Write the JSON result to this file instead of stdout
    #[arg(long, short)]
    output: Option<Utf8PathBuf>,

    /// Adjust program and its arguments, run inside the working tree
    #[arg(last = true)]
    adjust_command: Vec<String>,
}

impl Cli {
    fn pull_spec(&self) -> Result<PullSpec> {
        let mut spec = match &self.spec {
            Some(path) => {
                let contents = fs::read_to_string(path)?;
                serde_json::from_str::<PullSpec>(&contents)
                    .with_context(|| format!("invalid pull spec in {path}"))?
            }
            None => PullSpec {
                name: self.name.clone().context("--name is required")?,
                source_type: self.source_type.context("--type is required")?,
                url: self.url.clone().context("--url is required")?,
                reference: self.reference.clone(),
                adjust: false,
            },
        };
        spec.adjust |= self.adjust;
        Ok(spec)
    }

    fn adjuster(&self) -> Option<CommandAdjuster> {
        let (program, args) = self.adjust_command.split_first()?;
        Some(CommandAdjuster::new(program).args(args))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let spec = cli.pull_spec()?;
    let config = CaptureConfig::from_env()?;
    let repos = StaticRepoProvider::new(
        cli.internal_read_only_url.as_str(),
        cli.internal_url.as_str(),
    )?;
    let adjuster = cli.adjuster();
    if spec.adjust && adjuster.is_none() {
        anyhow::bail!("adjust requested but no adjust command was given");
    }

    tracing::info!(name = %spec.name, url = %spec.url, "capturing source");
    let report = Ingestor::new(config)
        .pull(
            &spec,
            &repos,
            adjuster.as_ref().map(|a| a as &dyn AdjustProvider),
        )
        .with_context(|| format!("failed to capture {}", spec.url))?;

    let json = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => {
            AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
                .write(|f| writeln!(f, "{json}"))
                .map_err(std::io::Error::from)
                .with_context(|| format!("failed to write {path}"))?;
        }
        None => println!("{json}"),
    }
    Ok(())
}
