use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::StorageBackend;

/// Myymotto CLI arguments
#[derive(Debug, Parser)]
#[command(
    name = "myymotto",
    version,
    about = "Vehicle document expiry tracking and reminder service"
)]
pub struct Cli {
    /// SQLite connection string (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// HTTP listen port (overrides SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Persistence backend: sqlite or memory (overrides STORAGE_BACKEND)
    #[arg(long, value_parser = parse_backend)]
    pub storage: Option<StorageBackend>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a single expiry sweep for one user and print the report
    Sweep {
        /// Owner of the vehicles to check
        #[arg(long)]
        user_id: i64,

        /// Pretend today is this date (YYYY-MM-DD)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn parse_backend(raw: &str) -> Result<StorageBackend, String> {
    StorageBackend::parse(raw)
}
