// Main entry point for the glyph deobfuscation workflow

use pua_workflow::{
    core::{
        types::{DecodedSpan, GlyphStatus, GroupStatus, RunAnalytics},
        Config, DecodeSession, Notice,
    },
    orchestration::decode_orchestrator::DecodeOrchestrator,
    utils::text_ops,
};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    orchestrator: Arc<DecodeOrchestrator>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new()?);

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "pua_workflow={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== PUA GLYPH DECODER ===");
    info!(
        "Config: range=U+{:04X}..U+{:04X} cell={}px lang={}",
        config.placeholder.range_start,
        config.placeholder.range_end,
        config.font_size(),
        config.language()
    );

    // Initialize decode orchestrator
    info!("Initializing decode orchestrator...");
    let orchestrator = Arc::new(DecodeOrchestrator::new(config.clone())?);
    let state = AppState {
        config: config.clone(),
        orchestrator,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router with monitoring endpoints
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/detect", post(detect_text))
        .route("/decode", post(decode_text))
        .with_state(state)
        .layer(DefaultBodyLimit::max(8 * 1024 * 1024)) // 8MB; inputs are chapter text
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /        - Root endpoint");
    info!("  GET  /health  - Health check");
    info!("  GET  /metrics - Prometheus metrics");
    info!("  GET  /stats   - Detailed statistics");
    info!("  POST /detect  - Scan text for placeholder glyphs (JSON)");
    info!("  POST /decode  - Run the full decode pipeline (JSON)");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "PUA Glyph Decoding Workflow"
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.orchestrator.engine_name(),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.orchestrator.metrics().to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.orchestrator.metrics().snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    text: String,
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    distinct: usize,
    total_occurrences: usize,
    glyphs: Vec<GlyphStatus>,
}

/// Scan text for placeholder glyphs without dispatching any recognition
///
/// # Request Format:
/// - JSON body: `{ "text": "..." }`
///
/// # Response:
/// - Distinct glyph count, total occurrences, and the per-glyph grid
async fn detect_text(
    State(state): State<AppState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, (StatusCode, String)> {
    state.orchestrator.metrics().record_endpoint_request("/detect");

    if request.text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No text provided".to_string()));
    }

    let normalized = text_ops::normalize_line_breaks(&request.text);
    let session = DecodeSession::new(state.config.placeholder_range());
    session.set_input(&normalized);

    let glyphs = session.glyph_grid();
    Ok(Json(DetectResponse {
        distinct: glyphs.len(),
        total_occurrences: glyphs.iter().map(|g| g.count).sum(),
        glyphs,
    }))
}

#[derive(Debug, Deserialize)]
struct DecodeRequest {
    text: String,
    font_key: Option<String>,
    language: Option<String>,
    /// Manual glyph corrections, applied after the run settles
    #[serde(default)]
    overrides: HashMap<char, String>,
}

#[derive(Debug, Serialize)]
struct DecodeResponse {
    run_id: u64,
    noop: bool,
    plain_text: String,
    spans: Vec<DecodedSpan>,
    glyphs: Vec<GlyphStatus>,
    groups: Vec<GroupStatus>,
    notices: Vec<Notice>,
    analytics: RunAnalytics,
}

/// Run the full decode pipeline over one text
///
/// # Request Format:
/// - JSON body: `{ "text": "...", "font_key": "...", "language": "...",
///   "overrides": { "": "好" } }` (all but `text` optional)
///
/// # Response:
/// - Decoded text (plain and span forms), glyph grid, per-group statuses,
///   notices, and run analytics
async fn decode_text(
    State(state): State<AppState>,
    Json(request): Json<DecodeRequest>,
) -> Result<Json<DecodeResponse>, (StatusCode, String)> {
    let start_time = std::time::Instant::now();
    state.orchestrator.metrics().record_endpoint_request("/decode");

    if request.text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "No text provided".to_string()));
    }

    info!("Received decode request ({} bytes)", request.text.len());

    let normalized = text_ops::normalize_line_breaks(&request.text);
    let session = DecodeSession::new(state.config.placeholder_range());
    session.set_input(&normalized);
    session.set_font_key(request.font_key.clone());
    session.set_language(request.language.clone());

    let report = state.orchestrator.run(&session).await.map_err(|e| {
        error!("Decode run failed: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Decode failed: {}", e),
        )
    })?;

    // Manual corrections win over whatever the run produced
    for (ch, value) in &request.overrides {
        if session.override_glyph(*ch, value) {
            state.orchestrator.metrics().record_override();
        }
    }

    let output = session.output();
    info!(
        "Request completed in {:.2}s: {} groups, {} unresolved glyphs",
        start_time.elapsed().as_secs_f64(),
        report.analytics.groups_total,
        output.unresolved_count()
    );

    Ok(Json(DecodeResponse {
        run_id: report.run_id,
        noop: report.noop,
        plain_text: output.plain_text(),
        spans: output.spans,
        glyphs: session.glyph_grid(),
        groups: report.groups,
        notices: report.notices,
        analytics: report.analytics,
    }))
}
