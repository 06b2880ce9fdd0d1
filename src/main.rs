//! murkylook API server
//!
//! Configuration file path comes from the first argument or `MURKYLOOK_CONFIG`;
//! without either, built-in defaults plus environment variables are used.

use anyhow::Result;
use murkylook::config::AppConfig;
use murkylook::server;
use murkylook::storage::Database;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("murkylook=info,tower_http=info")),
        )
        .init();

    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MURKYLOOK_CONFIG").ok());
    let config = AppConfig::load(path.as_deref())?;

    let db = Database::connect(&config.database)?;
    db.migrate().await?;
    tracing::info!("Migrations applied");

    server::serve(&config, db).await
}
