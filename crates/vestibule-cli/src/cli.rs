//! Command-line arguments.

use clap::{Parser, Subcommand};

/// Vestibule CLI - gate configuration tooling
#[derive(Parser, Debug)]
#[command(name = "vestibule")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a config file and print the resolved adapter chains
    Check {
        /// Gate config file (TOML)
        #[arg(short, long, env = "VESTIBULE_CONFIG")]
        config: String,
    },
    /// Print a config file with every default filled in
    Show {
        /// Gate config file (TOML)
        #[arg(short, long, env = "VESTIBULE_CONFIG")]
        config: String,
    },
    /// Hash a password for a user record
    HashPassword {
        /// Plain-text password
        password: String,
    },
}
