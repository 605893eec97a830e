//! Webhook receiver for tracker deliveries.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use stitch_github::normalize_webhook_payload;

use super::BridgeRuntime;

const WEBHOOK_SECRET_HEADER: &str = "x-stitch-webhook-secret";

struct WebhookServerState {
    runtime: Arc<BridgeRuntime>,
    secret: Option<String>,
}

pub fn build_webhook_router(runtime: Arc<BridgeRuntime>, secret: Option<String>) -> Router {
    let state = Arc::new(WebhookServerState { runtime, secret });
    Router::new()
        .route("/webhooks/github", post(handle_tracker_webhook))
        .route("/healthz", get(handle_webhook_health))
        .with_state(state)
}

/// Binds the webhook listener and serves until ctrl-c.
pub async fn run_webhook_server(
    runtime: Arc<BridgeRuntime>,
    bind: &str,
    secret: Option<String>,
) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook bound address")?;
    println!("issue bridge webhook server listening: addr={local_addr}");

    let app = build_webhook_router(runtime, secret);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("issue bridge webhook server exited unexpectedly")?;
    Ok(())
}

async fn handle_webhook_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

async fn handle_tracker_webhook(
    State(state): State<Arc<WebhookServerState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    if let Some(expected_secret) = state.secret.as_deref() {
        let observed = headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or("");
        if observed != expected_secret.trim() {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":{"code":"auth_failed","message":"invalid webhook secret"}})),
            );
        }
    }

    match normalize_webhook_payload(&body) {
        Ok(Some(event)) => {
            let kind = event.kind();
            state.runtime.handle_tracker_event(event).await;
            (
                StatusCode::OK,
                Json(json!({"status":"accepted","event":kind})),
            )
        }
        Ok(None) => (StatusCode::OK, Json(json!({"status":"ignored"}))),
        Err(error) => {
            eprintln!("issue bridge dropped malformed webhook delivery: {error:#}");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"error":{"code":"malformed_payload","message":error.to_string()}})),
            )
        }
    }
}
