use askama::Template;
use serde_json::Value;

use super::state::DashboardState;
use crate::api::{ApiError, KeyScope};
use crate::session::{ChatReply, GeneratedImageEntry, ImageSize, SessionState, UploadedImage};
use crate::tabs::{analysis, Notice, NoticeLevel};

// ── View rows ────────────────────────────────────────────────────────

pub struct ChatRow<'a> {
    pub message: &'a str,
    pub reply: Option<&'a str>,
    pub error: Option<&'a str>,
    pub timestamp: &'a str,
}

pub struct AnalysisRow<'a> {
    pub number: usize,
    pub image_url: String,
    pub filename: &'a str,
    pub timestamp: &'a str,
    pub result: String,
}

pub struct GenerationRow<'a> {
    pub number: usize,
    pub prompt: &'a str,
    pub size: &'static str,
    pub url: &'a str,
    pub timestamp: &'a str,
}

// ── Askama Templates ─────────────────────────────────────────────────

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate<'a> {
    pub api_base_url: &'a str,
    pub chat_key_ok: bool,
    pub generation_key_ok: bool,
    pub chat_key_var: &'static str,
    pub generation_key_var: &'static str,
    pub chat_html: String,
    pub analysis_html: String,
    pub generation_html: String,
}

#[derive(Template)]
#[template(path = "partials/chat.html")]
pub struct ChatTemplate<'a> {
    pub rows: Vec<ChatRow<'a>>,
    pub notice: Option<&'a Notice>,
}

#[derive(Template)]
#[template(path = "partials/analysis.html")]
pub struct AnalysisTemplate<'a> {
    pub accept: &'static str,
    pub pending: Option<&'a UploadedImage>,
    pub rows: Vec<AnalysisRow<'a>>,
    pub notice: Option<&'a Notice>,
    pub latest_result: Option<String>,
}

#[derive(Template)]
#[template(path = "partials/generation.html")]
pub struct GenerationTemplate<'a> {
    pub sizes: Vec<&'static str>,
    pub rows: Vec<GenerationRow<'a>>,
    pub notice: Option<&'a Notice>,
    pub latest: Option<&'a GeneratedImageEntry>,
}

#[derive(Template)]
#[template(path = "partials/notice.html")]
pub struct NoticeTemplate<'a> {
    pub n: &'a Notice,
}

#[derive(Template)]
#[template(path = "partials/status.html")]
pub struct StatusTemplate {
    pub ok: bool,
    pub text: String,
}

// ── Render helpers (called from routes.rs) ───────────────────────────

fn render_or_error<T: Template>(template: &T) -> String {
    template.render().unwrap_or_else(|e| {
        let msg = e
            .to_string()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;");
        format!(r#"<div class="notice-error">Template error: {}</div>"#, msg)
    })
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn render_index(state: &DashboardState, session: &SessionState) -> axum::response::Html<String> {
    let template = IndexTemplate {
        api_base_url: state.client.base_url(),
        chat_key_ok: state.keys.chat_analysis,
        generation_key_ok: state.keys.image_generation,
        chat_key_var: KeyScope::ChatAnalysis.env_var(),
        generation_key_var: KeyScope::ImageGeneration.env_var(),
        chat_html: render_chat(session, None),
        analysis_html: render_analysis(session, None, false),
        generation_html: render_generation(session, None),
    };
    axum::response::Html(render_or_error(&template))
}

/// Chat transcript in conversation order.
pub fn render_chat(session: &SessionState, notice: Option<&Notice>) -> String {
    let rows = session
        .chat
        .iter()
        .map(|entry| ChatRow {
            message: &entry.message,
            reply: match &entry.response {
                ChatReply::Reply { response } => Some(response.as_str()),
                ChatReply::Failed(_) => None,
            },
            error: entry.response.error(),
            timestamp: &entry.timestamp,
        })
        .collect();
    render_or_error(&ChatTemplate { rows, notice })
}

/// Analysis tab: pending upload preview and newest-first history.
///
/// `show_latest` expands the newest result under the notice, right after
/// an analysis.
pub fn render_analysis(session: &SessionState, notice: Option<&Notice>, show_latest: bool) -> String {
    let rows = session
        .analyses
        .newest_first()
        .map(|(number, entry)| AnalysisRow {
            number,
            image_url: entry.image.serve_path(),
            filename: &entry.image.filename,
            timestamp: &entry.timestamp,
            result: pretty_json(&entry.result),
        })
        .collect();
    let latest_result = session
        .analyses
        .last()
        .filter(|_| show_latest)
        .map(|entry| pretty_json(&entry.result));
    render_or_error(&AnalysisTemplate {
        accept: analysis::ACCEPT_ATTR,
        pending: session.pending_upload.as_ref(),
        rows,
        notice,
        latest_result,
    })
}

/// Generation tab: form, latest image after a success, newest-first history.
pub fn render_generation(session: &SessionState, notice: Option<&Notice>) -> String {
    let rows = session
        .generated
        .newest_first()
        .map(|(number, entry)| GenerationRow {
            number,
            prompt: &entry.prompt,
            size: entry.size.as_str(),
            url: &entry.url,
            timestamp: &entry.timestamp,
        })
        .collect();
    let latest = notice
        .filter(|n| n.level == NoticeLevel::Success)
        .and_then(|_| session.generated.last());
    render_or_error(&GenerationTemplate {
        sizes: ImageSize::ALL.iter().map(ImageSize::as_str).collect(),
        rows,
        notice,
        latest,
    })
}

pub fn render_notice(notice: &Notice) -> String {
    render_or_error(&NoticeTemplate { n: notice })
}

/// Liveness probe outcome, worded for the sidebar.
pub fn render_status(result: &Result<(), ApiError>) -> String {
    let (ok, text) = match result {
        Ok(()) => (true, "API is reachable".to_string()),
        Err(ApiError::HttpError { status, .. }) => (false, format!("API returned status {status}")),
        Err(e) => (false, format!("API connection failed: {e}")),
    };
    render_or_error(&StatusTemplate { ok, text })
}
