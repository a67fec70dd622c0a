//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cache;
mod query;
mod resolve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "bibquery")]
#[command(about = "Create BibTeX entries from paper URLs")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch BibTeX entries for one or more URLs
    Query {
        /// Paper URLs
        urls: Vec<String>,
        /// Read additional URLs from a file, one per line ("-" for stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Write entries to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Show the primary browser window
        #[arg(long)]
        visible: bool,
        /// Do not fall back to a Google Scholar search
        #[arg(long)]
        no_scholar: bool,
        /// Fail instead of opening a browser window when Scholar shows a challenge
        #[arg(long)]
        no_recovery: bool,
    },

    /// Show which extraction strategy applies to each URL
    Resolve {
        /// Paper URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Inspect or clear the Google Scholar cookie cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// List cached cookies
    Show,
    /// Delete the cache file
    Clear,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    match cli.command {
        Commands::Query {
            urls,
            input,
            output,
            visible,
            no_scholar,
            no_recovery,
        } => {
            let options = query::QueryOptions {
                input,
                output,
                visible,
                no_scholar,
                no_recovery,
            };
            query::cmd_query(config, &urls, options).await
        }
        Commands::Resolve { urls } => resolve::cmd_resolve(&config, &urls),
        Commands::Cache { command } => match command {
            CacheCommands::Show => cache::cmd_cache_show(&config),
            CacheCommands::Clear => cache::cmd_cache_clear(&config),
        },
    }
}
