use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Family Screen Time
///
/// Reports screen time to a family budget service, warns when time is
/// nearly up and locks the session when it runs out.
#[derive(Parser, Debug)]
#[command(name = "family-screentime")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (defaults to the platform location)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report usage and enforce the budget until interrupted
    Run {
        /// User to charge (overrides config and environment)
        #[arg(long)]
        user: Option<String>,
    },
    /// Show the remaining time for today
    Status {
        #[arg(long)]
        user: Option<String>,
    },
    /// Lift the lock with the parent PIN
    Unlock {
        /// Four-digit parent PIN
        #[arg(long)]
        pin: String,

        #[arg(long)]
        user: Option<String>,
    },
    /// Remove a previously granted unlock
    Relock,
    /// Run the reference budget service
    Serve {
        /// Address to listen on (overrides server.listen)
        #[arg(long)]
        listen: Option<String>,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write an example configuration file
    Init {
        /// Output path (defaults to the platform location)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
