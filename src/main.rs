use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Args, Commands, ConfigCommands};

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.config.as_deref();

    match args.command {
        Commands::Run { user } => commands::reporter::run(config, user.as_deref(), args.verbose),
        Commands::Status { user } => {
            commands::reporter::status(config, user.as_deref(), args.verbose)
        }
        Commands::Unlock { pin, user } => {
            commands::unlock::unlock(config, &pin, user.as_deref(), args.verbose)
        }
        Commands::Relock => commands::unlock::relock(config, args.verbose),
        Commands::Serve { listen } => commands::serve::serve(config, listen, args.verbose),
        Commands::Config { command } => match command {
            ConfigCommands::Init { output, force } => commands::config::init(output, force),
        },
    }
}
