//! HTTP API for the analyzer.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::analyzer::PhishingAnalyzer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<PhishingAnalyzer>,
}

/// Body of `POST /api/analyze`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_data_uri: Option<String>,
    #[serde(default)]
    pub email_data_uri: Option<String>,
}

/// Build the Axum router.
pub fn analysis_routes(analyzer: Arc<PhishingAnalyzer>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze", post(analyze))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { analyzer })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

// ── Analysis ────────────────────────────────────────────────────────────

/// POST /api/analyze
///
/// 200 with the verdict, or 400 with `{"error": ...}` when the body is not
/// a readable JSON object or the input cannot be normalized.
async fn analyze(
    State(state): State<AppState>,
    body: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable analysis request body");
            return bad_request(rejection.body_text());
        }
    };

    match state
        .analyzer
        .analyze_content(body.text, body.image_data_uri, body.email_data_uri)
        .await
    {
        Ok(verdict) => Json(verdict).into_response(),
        Err(e) => {
            warn!(error = %e, "Rejected analysis request");
            bad_request(e.to_string())
        }
    }
}

fn bad_request(message: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Serve the API until the process is stopped.
pub async fn serve(analyzer: Arc<PhishingAnalyzer>, port: u16) -> std::io::Result<()> {
    let app = analysis_routes(analyzer);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!(port, "Analysis API started");
    axum::serve(listener, app).await
}
