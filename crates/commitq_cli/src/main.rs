//! commitq CLI
//!
//! Operator tools for commitq queue directories.
//!
//! # Commands
//!
//! - `status` - Show pending entry and partition counts
//! - `peek` - List pending references without consuming them
//! - `prune` - Remove empty partition directories
//! - `drain` - Flush the queue into a discarding null target

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// commitq command-line queue tools.
#[derive(Parser)]
#[command(name = "commitq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue root directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending entry and partition counts
    Status,

    /// List pending references without consuming them
    Peek {
        /// Which subtree to list (add, remove, all)
        #[arg(short, long, default_value = "all")]
        kind: String,

        /// Maximum number of entries to list
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Remove empty partition directories
    Prune,

    /// Flush the queue into a discarding null target
    ///
    /// Destructive: delivered entries are deleted. Useful for
    /// measuring queue throughput or discarding a stale backlog.
    Drain {
        /// Documents per delivery call
        #[arg(short, long, default_value = "100")]
        batch_size: usize,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Status => {
            let path = cli.path.ok_or("Queue path required for status")?;
            commands::status::run(&path)?;
        }
        Commands::Peek { kind, limit } => {
            let path = cli.path.ok_or("Queue path required for peek")?;
            commands::peek::run(&path, &kind, limit)?;
        }
        Commands::Prune => {
            let path = cli.path.ok_or("Queue path required for prune")?;
            commands::prune::run(&path)?;
        }
        Commands::Drain { batch_size } => {
            let path = cli.path.ok_or("Queue path required for drain")?;
            commands::drain::run(&path, batch_size)?;
        }
        Commands::Version => {
            println!("commitq CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
