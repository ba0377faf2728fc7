use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use postenrich::config::ConfigError;
use postenrich::corpus::{self, CorpusError};
use postenrich::unification::UnifierConfigError;
use postenrich::{Backend, Config, EnrichmentPipeline, GenerationError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// postenrich - enrich social media posts with LLM metadata and unified tags
#[derive(Parser)]
#[command(name = "postenrich")]
#[command(about = "Extract post metadata and unify tags across a corpus using an LLM")]
#[command(version)]
struct Cli {
    /// JSON file containing an array of raw posts
    #[arg(value_name = "INPUT", default_value = "raw_posts.json")]
    input: PathBuf,

    /// Where to write the enriched posts
    #[arg(value_name = "OUTPUT", default_value = "data/processed_posts.json")]
    output: PathBuf,

    /// Generation backend (defaults to POSTENRICH_BACKEND, then groq)
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Model name (defaults to the backend's env var or built-in default)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the backend API
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Tags per unification request (defaults to POSTENRICH_CHUNK_SIZE, then 30)
    #[arg(short, long, value_name = "N")]
    chunk_size: Option<usize>,
}

fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Logs go to stderr; `RUST_LOG` overrides the default `postenrich=info`.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("postenrich=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the corpus, runs the pipeline and writes the result.
fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    info!(backend = %config.backend, chunk_size = config.chunk_size, "starting enrichment run");

    let client = config
        .build_client()
        .with_context(|| format!("Failed to configure {} backend", config.backend))?;
    let pipeline = EnrichmentPipeline::with_client(client, config.chunk_size)?;

    let posts = corpus::load_posts(&cli.input)?;
    let outcome = pipeline.run(posts).context("Enrichment run failed")?;

    for failure in &outcome.failed_chunks {
        warn!(
            chunk = failure.index,
            tags = ?failure.tags,
            "tags left as extracted because their chunk failed"
        );
    }

    corpus::write_posts(&cli.output, &outcome.posts)?;

    println!(
        "Enriched {} posts ({} tags mapped, {} chunks skipped) -> {}",
        outcome.posts.len(),
        outcome.mapping.len(),
        outcome.failed_chunks.len(),
        cli.output.display()
    );
    Ok(())
}

/// Applies command-line overrides on top of the environment configuration.
fn resolve_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut config = Config::from_env()?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(model) = &cli.model {
        config.model = Some(model.clone());
    }
    if let Some(url) = &cli.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    Ok(config)
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are bad configuration and bad input corpora; everything else,
/// including backend failures during the run, is internal.
fn is_user_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        if let Some(e) = cause.downcast_ref::<CorpusError>() {
            return e.is_input_error();
        }
        if let Some(e) = cause.downcast_ref::<GenerationError>() {
            return matches!(
                e,
                GenerationError::MissingApiKey { .. } | GenerationError::InvalidUrl(_)
            );
        }
        cause.is::<ConfigError>() || cause.is::<UnifierConfigError>()
    })
}
