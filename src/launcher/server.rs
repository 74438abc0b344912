use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::{Launcher, PubSubPushEnvelope};

/// Routes for a Pub/Sub push subscription.
/// A non-2xx reply makes Pub/Sub redeliver, so only launch failures answer 500.
pub fn router(launcher: Arc<Launcher>) -> Router {
    Router::new()
        .route("/", post(handle_push))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(launcher)
}

async fn handle_push(State(launcher): State<Arc<Launcher>>, body: Bytes) -> StatusCode {
    let operation = match PubSubPushEnvelope::from_slice(&body).and_then(|e| {
        info!(message_id = ?e.message.message_id, subscription = ?e.subscription, "Push received");
        e.operation()
    }) {
        Ok(operation) => operation,
        Err(e) => {
            warn!(error = %e, "Rejected push message");
            return StatusCode::BAD_REQUEST;
        }
    };

    match launcher.launch(operation).await {
        Ok(()) => StatusCode::NO_CONTENT,
        Err(e) => {
            error!(operation = %operation, error = %e, "Failed to launch polling instance");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(launcher: Arc<Launcher>, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for Pub/Sub push messages");
    axum::serve(listener, router(launcher))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
