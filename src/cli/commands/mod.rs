//! CLI parser and command dispatch.

mod manifest;
mod search;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "sidecar")]
#[command(about = "Run search engine scrapers behind a stateless JSON API")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Manifest path (overrides config)
    #[arg(short, long, global = true)]
    manifest: Option<PathBuf>,

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
    /// Start the HTTP API
    Serve {
        /// Bind address: port, host, or host:port (defaults from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run one search request (JSON) and print the response
    Dispatch {
        /// File holding the request body (reads stdin when omitted)
        file: Option<PathBuf>,
    },

    /// Print the filters an engine offers
    Filters {
        /// Engine identifier
        engine: String,
        /// Search category
        #[arg(short, long, default_value = "web")]
        page: String,
    },

    /// Manage the engine manifest
    Manifest {
        #[command(subcommand)]
        command: ManifestCommands,
    },
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Write the manifest for all built-in routines
    Generate {
        /// Output path (defaults to the configured manifest path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List engines in the manifest
    List,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (mut settings, _config) = load_settings_with_options(options).await;
    if let Some(manifest) = cli.manifest {
        settings.manifest_path = manifest;
    }

    match cli.command {
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Dispatch { file } => search::cmd_dispatch(&settings, file.as_deref()).await,
        Commands::Filters { engine, page } => {
            search::cmd_filters(&settings, &engine, &page).await
        }
        Commands::Manifest { command } => match command {
            ManifestCommands::Generate { output } => {
                manifest::cmd_generate(&settings, output.as_deref())
            }
            ManifestCommands::List => manifest::cmd_list(&settings),
        },
    }
}
