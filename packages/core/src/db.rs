//! SQLite pool construction and schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::storage::StorageError;

/// Open (creating if needed) the database at `database_url` and apply the
/// embedded migrations.
///
/// `sqlite::memory:` databases live only as long as their connection, so the
/// pool is pinned to a single connection that never idles out.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, StorageError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool_options = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    };

    let pool = pool_options.connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Database ready at {}", database_url);
    Ok(pool)
}
