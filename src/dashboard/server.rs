use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::routes;
use super::state::DashboardState;

/// Multipart framing allowance on top of the image size limit.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: Arc<DashboardState>) -> Router {
    let body_limit = state.config.max_upload_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    Router::new()
        // HTML pages
        .route("/", get(routes::index))
        // Tab actions (HTMX partials)
        .route("/chat", post(routes::submit_chat))
        .route("/chat/clear", post(routes::clear_chat))
        .route("/analysis/upload", post(routes::upload_image))
        .route("/analysis/analyze", post(routes::analyze_image))
        .route("/analysis/clear", post(routes::clear_analysis))
        .route("/analysis/image/:id", get(routes::serve_image))
        .route("/generation", post(routes::submit_generation))
        .route("/generation/clear", post(routes::clear_generation))
        // Sidebar and JSON
        .route("/api/status/html", get(routes::api_status_html))
        .route("/api/session", get(routes::session_json))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Bind `host:port` from the config and serve the dashboard until shutdown.
pub async fn start_dashboard(state: Arc<DashboardState>) -> anyhow::Result<()> {
    let addr = state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind dashboard on {addr}"))?;

    log::info!("dashboard listening on http://{}", addr);
    axum::serve(listener, router(state))
        .await
        .context("Dashboard server stopped unexpectedly")?;
    Ok(())
}
