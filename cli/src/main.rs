//! Main entry point for flux CLI

use clap::Parser;

mod cli;
mod commands;
mod output;

use cli::Cli;
use commands::execute_command;

fn main() {
    // Load environment variables from .env file if present
    if std::path::Path::new(".env").exists() {
        if let Err(e) = dotenv::dotenv() {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    let cli = Cli::parse();

    // RUST_LOG still wins when set; --verbose raises the default level
    let default_level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .init();

    if let Err(e) = execute_command(cli.command, cli.repo.as_deref()) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
