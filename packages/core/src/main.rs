use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;

use myymotto::api::{create_router, ApiState};
use myymotto::cli::{Cli, Command};
use myymotto::config::{Config, StorageBackend};
use myymotto::db::create_pool;
use myymotto::error::AppError;
use myymotto::expiry::{Clock, ExpiryService, FixedClock, SystemClock};
use myymotto::logging::init_logging;
use myymotto::metrics::AppMetrics;
use myymotto::repository::SqliteRepository;
use myymotto::storage::Storage;
use myymotto::store::MemoryStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    let config = Config::from_env()
        .map(|config| config.with_cli_overrides(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    tracing::info!("Service started with config: {:?}", config);

    if let Err(err) = run(cli, config).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> Result<(), AppError> {
    let storage = open_storage(&config).await?;
    let metrics = Arc::new(
        AppMetrics::new().map_err(|e| AppError::Server(format!("metrics registry: {}", e)))?,
    );

    match cli.command {
        Some(Command::Sweep { user_id, today }) => {
            let clock: Arc<dyn Clock> = match today {
                Some(date) => Arc::new(FixedClock(date)),
                None => Arc::new(SystemClock::new(config.reminder_offset)),
            };
            let service = ExpiryService::new(storage, clock)
                .with_cadence(config.reminder_cadence)
                .with_metrics(metrics);

            let report = service.run_expiry_check_process(user_id).await;
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Server(format!("could not encode report: {}", e)))?;
            println!("{}", json);
            Ok(())
        }
        None => serve(storage, metrics, &config).await,
    }
}

async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>, AppError> {
    match config.storage_backend {
        StorageBackend::Sqlite => {
            let pool = create_pool(&config.database_url).await?;
            tracing::info!("SQLite storage ready at {}", config.database_url);
            Ok(Arc::new(SqliteRepository::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn serve(
    storage: Arc<dyn Storage>,
    metrics: Arc<AppMetrics>,
    config: &Config,
) -> Result<(), AppError> {
    let expiry = ExpiryService::new(
        storage.clone(),
        Arc::new(SystemClock::new(config.reminder_offset)),
    )
    .with_cadence(config.reminder_cadence)
    .with_metrics(metrics.clone());

    let app = create_router(ApiState {
        storage,
        expiry: Arc::new(expiry),
        metrics,
    });

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Server(format!("could not bind {}: {}", addr, e)))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Could not install Ctrl+C handler: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
