use anyhow::Result;
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod storage;
mod workers;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate_only) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting file-vault on {}", cfg.addr());

    // --- Initialize SQLite connection ---
    let options = SqliteConnectOptions::from_str(&cfg.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    if migrate_only {
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Object store gateway + deletion pipeline ---
    let store: Arc<dyn storage::ObjectStore> = Arc::new(storage::s3::S3Gateway::new(&cfg.s3));
    let (queue, task_rx) = workers::task_queue::deletion_queue();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let deletion_worker = workers::deletion_worker::DeletionWorker::new(pool.clone(), store.clone());
    let deletion_handle = tokio::spawn(deletion_worker.run(task_rx, shutdown_rx.clone()));

    let cleanup_worker = workers::cleanup_worker::CleanupWorker::new(pool.clone(), queue.clone());
    let cleanup_handle = tokio::spawn(cleanup_worker.run(shutdown_rx));

    // --- Build router ---
    let state = services::AppState::new(pool, store, queue);
    let app: Router = routes::routes::routes().with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    // --- Stop background loops ---
    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(deletion_handle, cleanup_handle);

    Ok(())
}
