//! `relay-server`: hosts [`RelayHandler`] on `/api/chat`.
//!
//! Environment:
//! - `GEMINI_API_KEY` (required per request)
//! - `GEMINI_BASE_URL`, `GEMINI_MODEL`, `GEMINI_TIMEOUT_MS` (optional)
//! - `RELAY_BIND` (default `0.0.0.0:3000`)
//! - `RUST_LOG` (default `info`)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use gemini_relay::{RelayHandler, DEFAULT_CREDENTIAL_VAR};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_BIND: &str = "0.0.0.0:3000";

async fn chat(
    State(handler): State<Arc<RelayHandler>>,
    method: Method,
    body: Bytes,
) -> impl IntoResponse {
    let reply = handler.handle_http(method.as_str(), &body).await;
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(reply.body))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let handler = RelayHandler::from_env().map_err(anyhow::Error::msg)?;
    tracing::info!(
        model = %handler.options().model,
        max_retries = handler.options().max_retries,
        "relay configured"
    );
    if std::env::var(DEFAULT_CREDENTIAL_VAR).map_or(true, |key| key.is_empty()) {
        tracing::warn!(
            var = DEFAULT_CREDENTIAL_VAR,
            "API key is not set; requests will fail until it is"
        );
    }

    let app = Router::new()
        .route("/api/chat", any(chat))
        .with_state(Arc::new(handler));

    let bind = std::env::var("RELAY_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_owned());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(address = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}
