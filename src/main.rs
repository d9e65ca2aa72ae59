//! Haravan support chat web server

use haravan_chat_api::api;
use haravan_chat_api::config::{Settings, StartupSettings};
use haravan_chat_api::core::traits::SyncService;
use haravan_chat_api::infrastructure::database::DatabaseConnection;
use haravan_chat_api::service_provider;

use anyhow::Context;
use di::ServiceProvider;
use log::{error, info, warn};
use std::net::SocketAddr;
use tokio::runtime::{Builder, Runtime};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    // RUST_LOG wins over LOG_LEVEL
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(web_server_task(settings))
}

async fn web_server_task(settings: Settings) -> anyhow::Result<()> {
    let connection = DatabaseConnection::connect(&settings.database)
        .await
        .with_context(|| format!("failed to open database `{}`", settings.database.url))?;
    connection
        .migrate()
        .await
        .context("failed to apply database migrations")?;
    let pool = sqlx::SqlitePool::clone(&connection);

    let provider = service_provider(&settings, connection)?;

    if settings.startup.auto_sync {
        tokio::spawn(startup_sync(provider.clone(), settings.startup.clone()));
    }

    let app = api::router(provider, &settings.server);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", settings.server.port))
        .await
        .with_context(|| format!("failed to bind port {}", settings.server.port))?;
    info!("listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Shutting down...");
    pool.close().await;
    Ok(())
}

/// Best-effort catalog sync while the server is already accepting requests.
async fn startup_sync(provider: ServiceProvider, startup: StartupSettings) {
    let scope = provider.create_scope();
    let sync_service = scope.get_required::<dyn SyncService>();

    match tokio::time::timeout(startup.auto_sync_timeout, sync_service.sync_products()).await {
        Ok(Ok(report)) => info!(
            "startup sync stored {} products ({} fetched)",
            report.stored, report.fetched
        ),
        Ok(Err(e)) => error!("startup sync failed: {e}"),
        Err(_) => warn!(
            "startup sync abandoned after {}s",
            startup.auto_sync_timeout.as_secs()
        ),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
