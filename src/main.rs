//! Main entry point for equalizer CLI

use clap::Parser;
use equalizer::cli::Cli;
use equalizer::commands::execute_command;

fn main() {
    // Parse command line arguments first so --verbose reaches the logger's filter
    let cli = Cli::parse();

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(cli.log_level())
        .init();

    // Execute the command
    if let Err(e) = execute_command(cli.command, cli.work_dir.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(if e.is_internal() { 2 } else { 1 });
    }
}
