//! Operational entry point for the petal economy.
//!
//! Runs the recurring maintenance tasks that keep the economy's storage
//! healthy: applying pending migrations and garbage-collecting expired
//! idempotency records. Deployments run it once at release time and then
//! on a schedule (cron or equivalent); it is safe to run from any number
//! of instances concurrently.

use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use petal_db::PostgresPool;
use petal_economy::{EconomyConfig, PetalEconomy};

/// Default config file path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "petal-config.yaml";

/// Application entry point.
///
/// Initializes logging, loads configuration (path from the first CLI
/// argument or `PETAL_CONFIG`, falling back to `petal-config.yaml`;
/// missing file means defaults), connects to `PostgreSQL`, applies
/// migrations, and purges expired idempotency records.
///
/// # Errors
///
/// Returns an error if configuration loading, the database connection,
/// or any maintenance task fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("petal-maintenance starting");

    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PETAL_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_owned());

    let config = if Path::new(&config_path).exists() {
        let config = EconomyConfig::from_file(Path::new(&config_path))?;
        info!(config_path, "configuration loaded");
        config
    } else {
        info!(config_path, "config file not found, using defaults");
        let mut config = EconomyConfig::default();
        config.infrastructure.apply_env_overrides();
        config
    };

    let pool = PostgresPool::connect_url(&config.infrastructure.postgres_url).await?;

    pool.run_migrations().await?;

    let economy = PetalEconomy::new(pool.pool().clone(), config);
    let purged = economy.purge_expired_idempotency().await?;
    info!(purged, "expired idempotency records removed");

    pool.close().await;
    info!("petal-maintenance finished");
    Ok(())
}
