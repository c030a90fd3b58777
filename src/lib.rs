pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod store;

use std::future::Future;
use tokio::net::TcpListener;

// Export API types
pub use api::{
    create_dispatcher, create_router, ApiRoute, Dispatcher, Flow, Middleware, Reply, RequestBody,
    RequestCache, RequestContext, RouteDescriptor, RouteError, SchemaMiddleware,
};

pub use logic::{is_truthy, Validator};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    ConnectionPool, ContactRepository, DataError, MemoryPool, PgConnectionPool, Repository,
    RepositoryRegistry, UnitOfWork,
};

/// Serve the contacts application on `listener` until `shutdown` resolves
pub async fn run_server(
    listener: TcpListener,
    state: api::handlers::AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for SIGINT: {}", error);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                log::error!("Failed to listen for SIGTERM: {}", error);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => log::info!("Received SIGINT, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}
