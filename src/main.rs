use env_logger::Builder;
use log::LevelFilter;
use std::sync::Arc;
use tokio::net::TcpListener;
use transact_api::config::AppConfig;
use transact_api::store::{ConnectionPool, ContactRepository, PgConnectionPool, RepositoryRegistry};
use transact_api::{run_server, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    config.validate()?;
    let bind_address = config.server_address()?;

    let pool = Arc::new(PgConnectionPool::new(
        config.connect_options()?,
        config.database.capacity,
    ));
    pool.start().await?;

    let mut registry = RepositoryRegistry::new(pool.clone());
    registry.register::<ContactRepository>()?;
    registry.init().await?;

    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("Server running on http://{}", bind_address);

    let served = run_server(listener, Arc::new(registry), shutdown_signal()).await;
    if let Err(error) = &served {
        log::error!("Server stopped with an error: {:#}", error);
    }

    pool.close().await;
    log::info!("Shutdown complete");
    served
}
