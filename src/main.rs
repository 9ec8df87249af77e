//! diffscope — diff-aware code context retrieval CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use diffscope::cache;
use diffscope::config;
use diffscope::constants;
use diffscope::diff;
use diffscope::embedding;
use diffscope::env;
use diffscope::retrieval;
use diffscope::store;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use cli::args::{CacheAction, Cli, Command, ContextArgs, DiffInputArgs, HunksArgs};
use config::Config;
use embedding::QueryEmbedder;
use embedding::cache::CachedEmbedder;
use embedding::rig::RigEmbedder;
use env::Env;
use retrieval::ContextEngine;
use store::ChunkStore;
use store::memory::MemoryStore;
use store::qdrant::QdrantStore;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Context(args) => run_context(*args).await,
        Command::Hunks(args) => run_hunks(args).await,
        Command::Cache { action } => run_cache(action),
        Command::Version => run_version(),
    }
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!(
        "{} {}",
        constants::APP_NAME.bold(),
        constants::VERSION.green().bold()
    );
    Ok(())
}

/// Manage the embedding cache.
fn run_cache(action: CacheAction) -> Result<()> {
    let engine = cache::CacheEngine::new(true);

    match action {
        CacheAction::Clear => {
            let stats = engine.clear().context("failed to clear cache")?;
            println!(
                "Cleared {} cached entry/entries ({}).",
                stats.entries,
                stats.human_size(),
            );
        }
        CacheAction::Stats => {
            let stats = engine.stats().context("failed to read cache stats")?;
            println!("Cache entries: {}", stats.entries);
            println!("Cache size:    {}", stats.human_size());
        }
        CacheAction::Path => match engine.path() {
            Some(p) => println!("{}", p.display()),
            None => bail!("cache directory could not be determined"),
        },
    }

    Ok(())
}

/// Print the changed line ranges of a diff.
async fn run_hunks(args: HunksArgs) -> Result<()> {
    let input_mode = args.input.require_input().map_err(|e| anyhow::anyhow!("{e}"))?;
    let repo_root = resolve_repo_root(&args.input).await?;

    let diff_text = diff::read_diff(&input_mode, &repo_root)
        .await
        .context("failed to read diff")?;
    let files = diff::extract_hunks(&diff_text);

    println!(
        "{}",
        serde_json::to_string_pretty(&files).context("failed to serialize hunks")?
    );
    Ok(())
}

/// Retrieve and print ranked context for a change.
async fn run_context(args: ContextArgs) -> Result<()> {
    let input_mode = args.input.input_mode().map_err(|e| anyhow::anyhow!("{e}"))?;
    if input_mode.is_none() && args.description.trim().is_empty() {
        bail!("nothing to search for: provide a diff input (--diff-file, --diff-stdin, --diff-base) or --description");
    }

    let repo_root = resolve_repo_root(&args.input).await?;

    // Config layering: files and env, then CLI flags on top
    let mut config =
        Config::load(Some(&repo_root), &Env::real()).context("failed to load configuration")?;
    args.apply_to(&mut config);
    tracing::debug!(?config, "resolved configuration");

    let (diff_text, files) = match input_mode {
        Some(ref mode) => {
            let text = diff::read_diff(mode, &repo_root)
                .await
                .context("failed to read diff")?;
            let files = diff::extract_hunks(&text);
            tracing::debug!(
                files = files.len(),
                hunks = diff::hunks::total_hunks(&files),
                "parsed diff"
            );
            (text, files)
        }
        None => (String::new(), Vec::new()),
    };

    let store = build_store(&args, &config).await?;
    let embedder = build_embedder(&config)?;
    let engine = ContextEngine::new(store, embedder, config.retrieval.clone());

    // Ctrl-C cancels the in-flight request
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling retrieval");
            on_interrupt.cancel();
        }
    });

    let query = retrieval::compose_query(&args.description, &diff_text);
    let parsed_diff = input_mode.as_ref().map(|_| files.as_slice());
    let bundle = engine
        .search_context(&query, parsed_diff, &cancel)
        .await
        .context("context retrieval failed")?;

    print!("{}", args.format.render(&bundle));
    Ok(())
}

/// Resolve the repository root from `--path`, falling back to the directory itself.
async fn resolve_repo_root(input: &DiffInputArgs) -> Result<PathBuf> {
    let base_dir = std::fs::canonicalize(&input.path)
        .with_context(|| format!("--path directory not found: {}", input.path.display()))?;
    Ok(diff::git::find_repo_root(&base_dir)
        .await
        .unwrap_or(base_dir))
}

async fn build_store(args: &ContextArgs, config: &Config) -> Result<Arc<dyn ChunkStore>> {
    match args.index_file.as_deref() {
        Some(path) => Ok(Arc::new(load_index(path).await?)),
        None => {
            let store = QdrantStore::new(
                &config.store.url,
                config.store.api_key.as_deref(),
                &config.store.collection,
            )
            .with_context(|| format!("failed to connect to Qdrant at {}", config.store.url))?;
            Ok(Arc::new(store))
        }
    }
}

async fn load_index(path: &Path) -> Result<MemoryStore> {
    let store = MemoryStore::load(path)
        .await
        .context("failed to load index file")?;
    if store.is_empty() {
        tracing::warn!(path = %path.display(), "index file contains no chunks");
    }
    Ok(store)
}

fn build_embedder(config: &Config) -> Result<Arc<dyn QueryEmbedder>> {
    let rig = Arc::new(
        RigEmbedder::new(config.embedding.clone())
            .context("failed to set up embedding provider")?,
    );
    if !config.cache.enabled {
        return Ok(rig);
    }

    Ok(Arc::new(CachedEmbedder::new(
        rig,
        cache::CacheEngine::new(true),
        config.embedding.cache_label(),
    )))
}
