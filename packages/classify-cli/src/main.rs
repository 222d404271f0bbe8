//! Command-line driver for the field classification pipeline.
//!
//! Stages share their inputs and outputs through the directories named in
//! the environment (see `.env.example`), so they can run one at a time or
//! all together with `run`.

mod config;
mod stages;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use field_classifier::build_backend;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "field-classify")]
#[command(about = "Classify text fields extracted from binaries with an LLM")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split raw files into deduplicated batches
    Preprocess,

    /// Classify every prepared batch
    Classify {
        /// Exit non-zero when any batch fails
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Flag classified rows that need manual review
    Verify,

    /// Merge all batch results into one sorted file
    Merge,

    /// Preprocess, classify and verify in order
    Run {
        /// Exit non-zero when any batch fails
        #[arg(long)]
        fail_on_error: bool,
    },

    /// Pull candidate strings out of executables under a directory
    ExtractStrings {
        dir: PathBuf,

        /// Output file (default: RAW_FILES_PATH/strings_all_binary.txt)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,field_classifier=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    match cli.command {
        Commands::Preprocess => {
            stages::preprocess(&config).await?;
        }
        Commands::Classify { fail_on_error } => {
            classify(&config, fail_on_error).await?;
        }
        Commands::Verify => {
            stages::verify_results(&config).await?;
        }
        Commands::Merge => {
            stages::merge(&config).await?;
        }
        Commands::Run { fail_on_error } => {
            run_all(&config, fail_on_error).await?;
        }
        Commands::ExtractStrings { dir, output } => {
            let output = output.unwrap_or_else(|| stages::default_strings_output(&config));
            stages::extract(&dir, &output)?;
        }
    }

    Ok(())
}

async fn classify(config: &Config, fail_on_error: bool) -> Result<()> {
    let backend = build_backend(&config.gateway).context("Failed to configure LLM backend")?;
    let summary = stages::classify(config, backend).await?;

    if fail_on_error && !summary.is_success() {
        bail!(
            "{} of {} batches failed",
            summary.failure_count,
            summary.total()
        );
    }
    Ok(())
}

/// Run preprocess → classify → verify, stopping at the first stage that fails.
async fn run_all(config: &Config, fail_on_error: bool) -> Result<()> {
    let started = Instant::now();

    stage("preprocess", stages::preprocess(config)).await?;
    stage("classify", classify(config, fail_on_error)).await?;
    stage("verify", stages::verify_results(config)).await?;

    println!();
    println!(
        "{} {} ({:.1}s)",
        "✓".green().bold(),
        "All stages finished".bold(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

async fn stage<T>(name: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
    let separator = "=".repeat(60);
    println!();
    println!("{}", separator.dimmed());
    println!(
        "{} {}",
        format!("[{}]", Local::now().format("%Y-%m-%d %H:%M:%S")).dimmed(),
        format!("Stage: {}", name).bright_blue().bold()
    );
    println!("{}", separator.dimmed());

    let started = Instant::now();
    let result = work.await;
    let elapsed = started.elapsed().as_secs_f64();

    match &result {
        Ok(_) => println!("{} {} ({:.1}s)", "✓".green(), name, elapsed),
        Err(e) => println!(
            "{} {} failed after {:.1}s: {:#}",
            "✗".red(),
            name,
            elapsed,
            e
        ),
    }
    result.with_context(|| format!("Stage {} failed", name))
}
