use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::sync::Arc;

pub mod api;
pub mod config;
pub mod dashboard;
pub mod interface;
pub mod session;
pub mod tabs;

/// Run the dashboard: load `.env`, load and validate config, then serve.
///
/// Configuration is checked before the listener binds, so a bad base URL
/// never reaches the point of accepting input.
pub async fn run() -> Result<()> {
    // Load environment variables from .env
    dotenv().ok();

    let config = config::AppConfig::load()
        .validate()
        .context("Invalid dashboard configuration")?;
    init_logging(&config.log_level);

    let keys = config::KeyStatus::from_env();
    if !keys.chat_analysis {
        log::warn!("{} is not set; chat and image analysis will fail", config::CHAT_ANALYSIS_KEY_VAR);
    }
    if !keys.image_generation {
        log::warn!("{} is not set; image generation will fail", config::IMAGE_GENERATION_KEY_VAR);
    }

    interface::print_banner(&config, keys);

    let state = Arc::new(dashboard::DashboardState::new(config, keys));
    dashboard::start_dashboard(state).await
}

/// stderr logging; `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env).try_init();
}

// Re-exports for library consumers: common useful types
pub use api::{ApiError, BackendClient, Endpoint, ErrorMessage, FilePayload, Method};
pub use config::{AppConfig, KeyStatus};
pub use session::{
    AnalysisEntry, ChatEntry, ChatReply, GeneratedImageEntry, ImageSize, SessionState, Tab,
    UploadedImage,
};
pub use tabs::{Notice, NoticeLevel};
