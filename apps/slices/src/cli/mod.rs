//! # Slices CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show slice counts
//! - `import` - Bulk insert slices from a JSON file
//! - `resolve` - Print the reference closure of one or more IDs
//! - `init` - Initialize a new database

mod commands;

use crate::config::SlicesConfig;
use clap::{Parser, Subcommand, ValueEnum};
use slices_core::SliceError;
use std::fmt;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Slices - reference-graph catalog server
///
/// Stores short fragments that reference each other and serves each one
/// together with everything it transitively references.
#[derive(Parser, Debug)]
#[command(name = "slices")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the slice database (overrides the configuration)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend
    #[arg(short = 'B', long, global = true, value_enum, default_value_t = Backend::Redb)]
    pub backend: Backend,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where slices live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// ACID database file (redb)
    Redb,
    /// Process memory; nothing survives a restart
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Redb => write!(f, "redb"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Show slice counts
    Status,

    /// Insert slices from a JSON array file; existing IDs are kept
    Import {
        /// Path to the input file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the reference closure of one ID or a comma-separated list
    Resolve {
        /// Seed IDs, e.g. `7` or `1,2,3`
        ids: String,

        /// Exclude the seed itself (single ID only)
        #[arg(long)]
        refs_only: bool,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), SliceError> {
    let mut config = SlicesConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database = database;
    }
    let backend = cli.backend;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(&config, backend, &host, port).await,
        Some(Commands::Status) | None => cmd_status(&config, backend, json_mode),
        Some(Commands::Import { file }) => cmd_import(&config, backend, json_mode, &file),
        Some(Commands::Resolve { ids, refs_only }) => {
            cmd_resolve(&config, backend, json_mode, &ids, refs_only)
        }
        Some(Commands::Init { force }) => cmd_init(&config, backend, force),
    }
}
