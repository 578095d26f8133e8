//! Content Hub CLI
//!
//! Command-line tools for inspecting Content Hub sync data.
//!
//! # Commands
//!
//! - `inspect` - Summarize a CDF document
//! - `deps` - Print the dependency closure of a record in materialization order
//! - `state list` - List sync state rows
//! - `state purge` - Remove all sync state

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Content Hub command-line tools.
#[derive(Parser)]
#[command(name = "contenthub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a CDF document
    Inspect {
        /// CDF document (JSON)
        file: PathBuf,

        /// List every record
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the dependencies of a record in materialization order
    Deps {
        /// CDF document (JSON)
        file: PathBuf,

        /// UUID of the root record
        #[arg(short, long)]
        root: Uuid,

        /// Maximum dependency depth (overrides the configuration)
        #[arg(short, long)]
        depth: Option<u32>,

        /// Hub configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Inspect or reset sync state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum StateCommands {
    /// List tracked entities
    List {
        /// Path to the sync state file
        #[arg(short, long)]
        path: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove every row, as when the site disconnects
    Purge {
        /// Path to the sync state file
        #[arg(short, long)]
        path: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            file,
            records,
            format,
        } => {
            commands::inspect::run(&file, records, &format)?;
        }
        Commands::Deps {
            file,
            root,
            depth,
            config,
            format,
        } => {
            commands::deps::run(&file, root, depth, config.as_deref(), &format)?;
        }
        Commands::State { command } => match command {
            StateCommands::List { path, format } => commands::state::list(&path, &format)?,
            StateCommands::Purge { path } => commands::state::purge(&path)?,
        },
        Commands::Version => {
            println!("Content Hub CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Content Hub Sync Engine v{}", contenthub_sync_engine::VERSION);
        }
    }

    Ok(())
}
