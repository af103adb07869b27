use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Swarmchain - gossip-replicated consensus for drone swarms
#[derive(Parser)]
#[command(name = "swarmchain")]
#[command(about = "Swarmchain node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Swarmchain node
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new node configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },
}
