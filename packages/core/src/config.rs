use std::env;

use chrono::FixedOffset;

use crate::cli::Cli;
use crate::expiry::ReminderCadence;

const DEFAULT_DATABASE_URL: &str = "sqlite://myymotto.db";
const DEFAULT_SERVER_PORT: u16 = 8080;
/// India Standard Time; the date a reminder is computed against.
const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub storage_backend: StorageBackend,
    pub server_port: u16,
    pub reminder_offset: FixedOffset,
    pub reminder_cadence: ReminderCadence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

impl StorageBackend {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(format!("Invalid storage backend: {}", other)),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from any key lookup. Every key is optional.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        if database_url.trim().is_empty() {
            return Err("DATABASE_URL must not be empty".to_string());
        }

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(raw) => StorageBackend::parse(&raw)?,
            None => StorageBackend::Sqlite,
        };

        let server_port = match lookup("SERVER_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| "SERVER_PORT must be a valid port number")?,
            None => DEFAULT_SERVER_PORT,
        };

        let offset_minutes = match lookup("REMINDER_UTC_OFFSET_MINUTES") {
            Some(raw) => raw
                .parse::<i32>()
                .map_err(|_| "REMINDER_UTC_OFFSET_MINUTES must be a whole number")?,
            None => DEFAULT_UTC_OFFSET_MINUTES,
        };
        let reminder_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                format!(
                    "REMINDER_UTC_OFFSET_MINUTES out of range: {}",
                    offset_minutes
                )
            })?;

        let reminder_cadence = match lookup("REMINDER_CADENCE") {
            Some(raw) => ReminderCadence::parse(&raw)
                .ok_or_else(|| format!("Invalid REMINDER_CADENCE: {}", raw))?,
            None => ReminderCadence::Always,
        };

        Ok(Self {
            database_url,
            storage_backend,
            server_port,
            reminder_offset,
            reminder_cadence,
        })
    }

    /// Command-line flags win over environment values.
    pub fn with_cli_overrides(mut self, cli: &Cli) -> Self {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(port) = cli.port {
            self.server_port = port;
        }
        if let Some(backend) = cli.storage {
            self.storage_backend = backend;
        }
        self
    }
}
