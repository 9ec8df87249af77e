//! Clap argument types and validation.

use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

use diffscope::config::Config;
use diffscope::models::ContextBundle;

// InputMode is defined in models/ and re-exported here for convenience.
pub use diffscope::models::InputMode;

/// Diff-aware code context retrieval.
#[derive(Parser, Debug)]
#[command(name = "diffscope", version = diffscope::constants::VERSION)]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Retrieve ranked code context for a change.
    Context(Box<ContextArgs>),

    /// Print the changed line ranges of a diff as JSON.
    Hunks(HunksArgs),

    /// Manage the embedding cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print version information.
    Version,
}

/// Cache management subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum CacheAction {
    /// Remove all cached query embeddings.
    Clear,
    /// Show cache statistics (entry count and size).
    Stats,
    /// Print the cache directory path.
    Path,
}

/// Where to read the diff from. At most one source may be given.
#[derive(Args, Debug, Clone, Default)]
pub struct DiffInputArgs {
    /// Path to the repository or working directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub path: PathBuf,

    /// Pre-computed unified diff file.
    #[arg(long)]
    pub diff_file: Option<PathBuf>,

    /// Read unified diff from stdin.
    #[arg(long, default_value_t = false)]
    pub diff_stdin: bool,

    /// Branch or commit to diff against (uses git diff).
    #[arg(long, visible_alias = "diff")]
    pub diff_base: Option<String>,
}

impl DiffInputArgs {
    /// Resolve the selected input source, if any.
    pub fn input_mode(&self) -> Result<Option<InputMode>, String> {
        let count = [
            self.diff_file.is_some(),
            self.diff_stdin,
            self.diff_base.is_some(),
        ]
        .iter()
        .filter(|&&x| x)
        .count();

        if count > 1 {
            return Err(
                "only one input source allowed: --diff-file, --diff-stdin, or --diff-base"
                    .to_string(),
            );
        }

        Ok(if let Some(ref path) = self.diff_file {
            Some(InputMode::DiffFile(path.clone()))
        } else if self.diff_stdin {
            Some(InputMode::Stdin)
        } else {
            self.diff_base.clone().map(InputMode::GitBase)
        })
    }

    /// Resolve the input source, requiring exactly one.
    pub fn require_input(&self) -> Result<InputMode, String> {
        self.input_mode()?.ok_or_else(|| {
            "one input source is required: --diff-file, --diff-stdin, or --diff-base".to_string()
        })
    }
}

/// Arguments for the `context` subcommand.
#[derive(Parser, Debug, Default)]
pub struct ContextArgs {
    #[command(flatten)]
    pub input: DiffInputArgs,

    /// Natural-language description of the change (e.g. the PR title and body).
    #[arg(long, default_value = "")]
    pub description: String,

    /// Serve chunks from a local JSON/JSONL index instead of Qdrant.
    #[arg(long)]
    pub index_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Max concurrent hunk queries.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Abort retrieval after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Disable the embedding cache.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
}

impl ContextArgs {
    /// Apply CLI flags on top of the loaded config (highest priority layer).
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(n) = self.max_concurrent.filter(|&n| n > 0) {
            config.retrieval.max_concurrent = n;
        }
        if self.timeout.is_some() {
            config.retrieval.timeout_secs = self.timeout;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}

/// Arguments for the `hunks` subcommand.
#[derive(Parser, Debug)]
pub struct HunksArgs {
    #[command(flatten)]
    pub input: DiffInputArgs,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain context blocks for a downstream reviewer.
    #[default]
    Text,
    /// Colored summary for humans.
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render a bundle using the renderer for this format.
    pub fn render(&self, bundle: &ContextBundle) -> String {
        use diffscope::output::ContextRenderer;
        match self {
            OutputFormat::Text => diffscope::output::text::TextRenderer.render(bundle),
            OutputFormat::Terminal => diffscope::output::terminal::TerminalRenderer.render(bundle),
            OutputFormat::Json => diffscope::output::json::JsonRenderer.render(bundle),
        }
    }
}
