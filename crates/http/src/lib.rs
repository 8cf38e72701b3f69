//! HTTP server facade for Shelf with Axum, envelope responses, and OpenAPI support.

use std::sync::Arc;

use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use shelf_db::DocumentDatabase;
use shelf_kernel::{settings::Settings, ModuleRegistry};
use tokio::signal;

pub mod error;
pub mod response;
pub mod router;

use response::{Envelope, ErrorBody};
use router::RouterBuilder;

/// Start the HTTP server and serve until SIGINT/SIGTERM
pub async fn start_server(
    registry: &ModuleRegistry,
    settings: &Settings,
    db: Arc<dyn DocumentDatabase>,
) -> anyhow::Result<()> {
    let address = format!("{}:{}", settings.server.host, settings.server.port);
    tracing::info!("starting HTTP server on {}", address);

    let app = build_router(registry, db);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!("HTTP server listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server shutdown complete");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, db: Arc<dyn DocumentDatabase>) -> Router {
    // Layers only wrap routes registered before them, so routes go first.
    RouterBuilder::new()
        .route("/healthz", get(health_check))
        .route("/readyz", get(move || readiness_check(db.clone())))
        .mount_modules(registry)
        .with_openapi(registry)
        .with_request_id()
        .with_cors()
        .with_tracing()
        .build()
}

async fn health_check() -> &'static str {
    "ok"
}

/// Ping the database; 503 with an envelope when it cannot be reached
async fn readiness_check(db: Arc<dyn DocumentDatabase>) -> axum::response::Response {
    match db.ping().await {
        Ok(()) => "ok".into_response(),
        Err(err) => {
            let body = ErrorBody::new("storage_unavailable", Vec::new());
            tracing::error!(
                error_id = %body.trace_id,
                backend = db.backend(),
                error = %err,
                "readiness check failed"
            );
            Envelope::failure(
                StatusCode::SERVICE_UNAVAILABLE,
                "database unreachable",
                Some(body),
            )
            .into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
