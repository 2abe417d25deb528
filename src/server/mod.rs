//! HTTP server wiring: shared state, routes, startup and shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::db::{HanaPool, MssqlPool, QueryExecutor};
use crate::documents::DocumentService;
use crate::sap_query_generator::{Dialect, DocumentTableMap};

pub mod handlers;
pub mod models;

/// Requests must finish inside this window; it sits above the largest
/// per-query timeout so the database layer reports timeouts first.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(150);

/// Ad-hoc query bodies are small JSON; 1 MiB is generous.
const MAX_BODY_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub documents: DocumentService,
    pub config: ServerConfig,
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    // The pooled handle only serves the document listing; the ad-hoc
    // proxy builds its own connections from caller credentials.
    let executor: Arc<dyn QueryExecutor> = match config.database.dialect {
        Dialect::Mssql => Arc::new(
            MssqlPool::connect(&config.database)
                .await
                .context("connecting to MSSQL")?,
        ),
        Dialect::Hana => Arc::new(
            HanaPool::connect(&config.database)
                .await
                .context("connecting to HANA")?,
        ),
    };
    log::info!(
        "connected to {} database {} at {}:{}",
        config.database.dialect.as_str(),
        config.database.database,
        config.database.server,
        config.database.port
    );

    let documents = DocumentService::new(
        executor,
        config.database.dialect,
        DocumentTableMap::standard(),
    );

    let state = Arc::new(AppState {
        documents,
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/sql", post(handlers::ad_hoc_query))
        .route("/sql/flat", post(handlers::ad_hoc_query_flat))
        .route("/documents", get(handlers::list_documents))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state);

    let bind_address = format!("{}:{}", config.http_host, config.http_port);
    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding HTTP listener to {}", bind_address))?;
    log::info!("HTTP server listening on {}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    log::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("failed to register shutdown handler: {}", e);
        // Without a signal handler the future must never resolve, or
        // the server would shut down immediately.
        std::future::pending::<()>().await;
    }
    log::info!("shutdown signal received");
}
