//! Econ CLI - database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Apply pending migrations to DATABASE_URL
//! econ-cli migrate
//!
//! # Print the HASHED_ADMIN_PASSWORD value for a password
//! econ-cli hash-password 'correct horse battery staple'
//!
//! # Same, reading the password from stdin so it stays out of shell history
//! econ-cli hash-password < password.txt
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `hash-password` - Hash an admin password for configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "econ-cli")]
#[command(author, version, about = "Econ CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Hash an admin password for `HASHED_ADMIN_PASSWORD`
    HashPassword {
        /// Password to hash; read from stdin when omitted
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::HashPassword { password } => commands::password::hash(password)?,
    }
    Ok(())
}
