//! OAuth bootstrap HTTP server.
//!
//! A small axum app for acquiring the first token: `/oauth/start` redirects
//! the operator's browser to TickTick's consent page and the callback
//! exchanges the returned code. The success response includes the persisted
//! token payload so headless deployments can copy it into
//! `TICKTICK_OAUTH_TOKEN`. This server never speaks MCP; it exists only to
//! mint and cache tokens.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::auth::AuthManager;

#[derive(Clone)]
struct AppState {
    auth: Arc<AuthManager>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    error: Option<String>,
}

pub async fn serve(auth: Arc<AuthManager>, port: u16) -> anyhow::Result<()> {
    let state = AppState { auth };
    let app = Router::new()
        .route("/oauth/start", get(oauth_start))
        .route("/oauth/callback", get(oauth_callback))
        // TickTick apps registered with a bare /callback redirect URI
        .route("/callback", get(oauth_callback))
        .route("/health", get(health))
        .with_state(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "OAuth server listening; open /oauth/start to authorize");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn oauth_start(State(state): State<AppState>) -> Redirect {
    let url = state.auth.start_authorization().await;
    tracing::info!("redirecting to authorization page");
    Redirect::temporary(url.as_str())
}

async fn oauth_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    if let Some(error) = query.error {
        tracing::warn!(error = %error, "authorization denied by provider");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": format!("authorization denied: {}", error) })),
        );
    }
    let Some(code) = query.code else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing authorization code in callback" })),
        );
    };

    match state.auth.handle_callback(&code).await {
        Ok(record) => {
            tracing::info!("authorization complete, token cached");
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Authorization complete. For headless deployments, set \
                                TICKTICK_OAUTH_TOKEN to the token payload below.",
                    "token": record,
                })),
            )
        }
        Err(e) => {
            tracing::error!("code exchange failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": format!("code exchange failed: {}", e) })),
            )
        }
    }
}
