use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;

/// Updates are small JSON documents; anything bigger is not from Telegram.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Every path goes to the dispatcher, which does its own token matching.
pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new().fallback(webhook).with_state(dispatcher)
}

async fn webhook(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    // Foreign paths are acknowledged without reading what they sent.
    if parts.uri.path() != dispatcher.webhook_path() {
        return dispatcher
            .handle(axum::http::Request::from_parts(parts, Bytes::new()))
            .await;
    }
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Rejected webhook body: {}", e);
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }
    };
    dispatcher
        .handle(axum::http::Request::from_parts(parts, body))
        .await
}

/// Serve the webhook until Ctrl-C.
pub async fn serve(addr: SocketAddr, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening for webhook requests on {}", addr);

    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
