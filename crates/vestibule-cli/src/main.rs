#![forbid(unsafe_code)]

//! Vestibule CLI
//!
//! Command-line interface for vestibule gate configurations.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vestibule_cli::cli::{Args, Command};
use vestibule_cli::handlers;

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let output = match args.command {
        Command::Check { config } => handlers::cmd_check(&config)?,
        Command::Show { config } => handlers::cmd_show(&config)?,
        Command::HashPassword { password } => handlers::cmd_hash_password(&password)?,
    };
    println!("{output}");

    Ok(())
}
