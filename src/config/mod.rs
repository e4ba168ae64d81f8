pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "muve-sumo-server")]
#[command(about = "Server for simulating traffic and relaying traffic information through SUMO")]
pub struct CliConfig {
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the configured SUMO instances until interrupted
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long, default_value = "muve-server.toml")]
        config: PathBuf,

        /// Validate the configuration and show what would run
        #[arg(long)]
        dry_run: bool,
    },

    /// Check that SUMO and its Python packages can be found
    Check {
        #[arg(long, default_value = crate::domain::model::DEFAULT_SUMO_COMMAND)]
        sumo_command: String,

        /// Interpreter used to import the SUMO packages
        #[arg(long, default_value = "python3")]
        python: String,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Symlink libsumo, traci and sumolib into a Python environment
    Link {
        /// Directory to link into; defaults to the interpreter's site-packages
        #[arg(long)]
        target: Option<PathBuf>,

        #[arg(long, default_value = "python3")]
        python: String,
    },
}
