//! # Knowledge Assistant CLI (`ka`)
//!
//! ## Usage
//!
//! ```bash
//! ka --config ./config/ka.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ka serve` | Warm the index and start the HTTP API |
//! | `ka index build [--rebuild]` | Load or build the embedding index |
//! | `ka search "<query>"` | Print the best-matching chunks |
//! | `ka ask "<question>"` | Run the full guardrailed pipeline once |
//! | `ka templates` | List prompt templates |
//!
//! Without `--config`, `./config/ka.toml` is used when it exists and the
//! built-in defaults otherwise. Environment variables override both.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use knowledge_assistant::ask::AskRequest;
use knowledge_assistant::{commands, config, logging, server};

const DEFAULT_CONFIG_PATH: &str = "./config/ka.toml";

/// Knowledge Assistant: grounded answers over enterprise documentation.
#[derive(Parser)]
#[command(name = "ka", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    Serve,

    /// Manage the embedding index.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Search the index and print scored chunks.
    Search {
        query: String,

        /// Number of chunks to return (default: `[retrieval] top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Answer a question and print the JSON response.
    Ask {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,

        /// Prompt template name (see `ka templates`).
        #[arg(long)]
        template: Option<String>,

        /// Include the rendered prompts in the output.
        #[arg(long)]
        debug_prompt: bool,
    },

    /// List prompt templates.
    Templates,
}

#[derive(Subcommand)]
enum IndexAction {
    /// Load the index, building it from the documents if it does not exist.
    Build {
        /// Delete the existing index file first.
        #[arg(long)]
        rebuild: bool,
    },
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| {
        let default = Path::new(DEFAULT_CONFIG_PATH);
        default.exists().then(|| default.to_path_buf())
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config);
    let cfg = config::load_config(config_path.as_deref())?;
    logging::init(&cfg.logging);

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Index { action } => match action {
            IndexAction::Build { rebuild } => {
                commands::run_index_build(&cfg, rebuild).await?;
            }
        },
        Commands::Search { query, top_k } => {
            commands::run_search(&cfg, &query, top_k).await?;
        }
        Commands::Ask {
            question,
            top_k,
            template,
            debug_prompt,
        } => {
            let request = AskRequest {
                question,
                top_k,
                prompt_template: template,
                debug_prompt,
            };
            commands::run_ask(&cfg, request).await?;
        }
        Commands::Templates => {
            commands::run_templates(&cfg);
        }
    }

    Ok(())
}
