use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, SET_COOKIE},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{Html, IntoResponse, Json, Response},
    Form,
};
use log::warn;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::state::{session_cookie, DashboardState, SessionHandle};
use super::templates;
use crate::session::Tab;
use crate::tabs::{analysis, chat, generation, Notice};

const BUSY_MESSAGE: &str = "A request is already in progress";

// ── GET / — full dashboard page ──────────────────────────────────────

pub async fn index(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let session = handle.session.state.lock().await;
    let page = templates::render_index(&state, &session);
    with_cookie(&handle, page.into_response())
}

// ── Chat tab ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ChatForm {
    #[serde(default)]
    pub message: String,
}

pub async fn submit_chat(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Response {
    let handle = state.resolve_session(&headers).await;
    let Some(_busy) = handle.session.try_begin(Tab::Chat) else {
        return busy_response(&handle, Tab::Chat);
    };
    let outcome = chat::send(&state.client, &form.message).await;
    let mut session = handle.session.state.lock().await;
    let notice = outcome.apply_to(&mut session.chat);
    respond(&handle, templates::render_chat(&session, Some(&notice)))
}

pub async fn clear_chat(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let mut session = handle.session.state.lock().await;
    chat::clear(&mut session);
    respond(&handle, templates::render_chat(&session, None))
}

// ── Image analysis tab ───────────────────────────────────────────────

pub async fn upload_image(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let handle = state.resolve_session(&headers).await;
    let upload = read_image_field(&mut multipart).await;

    let mut session = handle.session.state.lock().await;
    let notice = match upload {
        Ok(Some((filename, mime_type, bytes))) => analysis::select_upload(
            &mut session,
            &filename,
            &mime_type,
            bytes,
            state.config.max_upload_bytes,
        ),
        Ok(None) => Notice::warning("Please choose an image to upload"),
        Err(e) => {
            warn!("failed to read upload: {}", e);
            Notice::error(format!("Failed to read the uploaded file: {e}"))
        }
    };
    respond(&handle, templates::render_analysis(&session, Some(&notice), false))
}

pub async fn analyze_image(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let Some(_busy) = handle.session.try_begin(Tab::Analysis) else {
        return busy_response(&handle, Tab::Analysis);
    };
    let pending = handle.session.state.lock().await.pending_upload.clone();
    let outcome = analysis::send(&state.client, pending).await;
    let recorded = outcome.is_recorded();
    let mut session = handle.session.state.lock().await;
    let notice = outcome.apply_to(&mut session.analyses);
    respond(&handle, templates::render_analysis(&session, Some(&notice), recorded))
}

pub async fn clear_analysis(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let mut session = handle.session.state.lock().await;
    analysis::clear(&mut session);
    respond(&handle, templates::render_analysis(&session, None, false))
}

// ── GET /analysis/image/:id — session-owned image bytes ─────────────

pub async fn serve_image(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    let handle = state.resolve_session(&headers).await;
    let session = handle.session.state.lock().await;
    match session.find_image(id) {
        Some(image) => (
            [
                (CONTENT_TYPE, image.mime_type.clone()),
                (CACHE_CONTROL, "private, max-age=3600".to_string()),
            ],
            image.bytes.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ── Image generation tab ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct GenerationForm {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub size: String,
}

pub async fn submit_generation(
    State(state): State<Arc<DashboardState>>,
    headers: HeaderMap,
    Form(form): Form<GenerationForm>,
) -> Response {
    let handle = state.resolve_session(&headers).await;
    let Some(_busy) = handle.session.try_begin(Tab::Generation) else {
        return busy_response(&handle, Tab::Generation);
    };
    let outcome = generation::send_form(&state.client, &form.prompt, &form.size).await;
    let mut session = handle.session.state.lock().await;
    let notice = outcome.apply_to(&mut session.generated);
    respond(&handle, templates::render_generation(&session, Some(&notice)))
}

pub async fn clear_generation(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let mut session = handle.session.state.lock().await;
    generation::clear(&mut session);
    respond(&handle, templates::render_generation(&session, None))
}

// ── GET /api/status/html — liveness probe fragment ───────────────────

pub async fn api_status_html(State(state): State<Arc<DashboardState>>) -> impl IntoResponse {
    let result = state.client.probe().await;
    Html(templates::render_status(&result))
}

// ── GET /api/session — JSON snapshot of the caller's logs ────────────

pub async fn session_json(State(state): State<Arc<DashboardState>>, headers: HeaderMap) -> Response {
    let handle = state.resolve_session(&headers).await;
    let snapshot = handle.session.state.lock().await.snapshot();
    with_cookie(&handle, Json(snapshot).into_response())
}

// ── Helpers ──────────────────────────────────────────────────────────

/// First `image` field of the form, or `None` when no file was chosen.
async fn read_image_field(
    multipart: &mut Multipart,
) -> Result<Option<(String, String, Bytes)>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await?;
        if filename.is_empty() && bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some((filename, mime_type, bytes)));
    }
    Ok(None)
}

fn respond(handle: &SessionHandle, html: String) -> Response {
    with_cookie(handle, Html(html).into_response())
}

fn with_cookie(handle: &SessionHandle, mut response: Response) -> Response {
    if handle.is_new {
        if let Ok(value) = HeaderValue::from_str(&session_cookie(handle.id)) {
            response.headers_mut().insert(SET_COOKIE, value);
        }
    }
    response
}

/// Refusal for a second submission while the tab's request is pending.
///
/// Swapped into the tab's notice area only, leaving the panel intact.
fn busy_response(handle: &SessionHandle, tab: Tab) -> Response {
    let target = match tab {
        Tab::Chat => "#chat-notice",
        Tab::Analysis => "#analysis-notice",
        Tab::Generation => "#generation-notice",
    };
    let mut response = respond(handle, templates::render_notice(&Notice::warning(BUSY_MESSAGE)));
    let headers = response.headers_mut();
    headers.insert(HeaderName::from_static("hx-retarget"), HeaderValue::from_static(target));
    headers.insert(HeaderName::from_static("hx-reswap"), HeaderValue::from_static("innerHTML"));
    response
}
