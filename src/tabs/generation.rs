use log::info;
use serde_json::{json, Value};

use super::{require_text, Notice, Outcome};
use crate::api::{ApiError, BackendClient, Endpoint, Method};
use crate::session::{timestamp_now, GeneratedImageEntry, ImageSize, SessionState, Tab};

/// Image URL from a successful generation result.
///
/// A success without a non-empty string `url` field is still a failure.
pub fn extract_image_url(result: &Value) -> Result<String, ApiError> {
    result
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("url", "No image URL in response"))
}

/// Request one generated image without touching any session.
///
/// Only a validated success (with a URL) yields an entry. A success without
/// one shows the raw response below the error.
pub async fn send(
    client: &BackendClient,
    prompt: &str,
    size: ImageSize,
) -> Outcome<GeneratedImageEntry> {
    let prompt = match require_text("prompt", prompt, "Please enter a description") {
        Ok(p) => p,
        Err(e) => return Outcome::without_entry(Notice::rejected(&e)),
    };

    let body = json!({ "prompt": prompt, "size": size.as_str() });
    let value = match client
        .call(Method::Post, Endpoint::ImageGeneration, Some(&body), None)
        .await
    {
        Ok(value) => value,
        Err(e) => return Outcome::without_entry(Notice::error(e.to_string())),
    };

    match extract_image_url(&value) {
        Ok(url) => {
            info!("generated {} image", size);
            Outcome::recorded(
                GeneratedImageEntry {
                    prompt,
                    url,
                    size,
                    timestamp: timestamp_now(),
                },
                Notice::success("Image generated!"),
            )
        }
        Err(e) => Outcome::without_entry(
            Notice::error(e.to_string()).with_detail(format!("Raw response: {value}")),
        ),
    }
}

/// Same as [`send`], with the size still in its submitted text form.
pub async fn send_form(
    client: &BackendClient,
    prompt: &str,
    size: &str,
) -> Outcome<GeneratedImageEntry> {
    match size.parse::<ImageSize>() {
        Ok(size) => send(client, prompt, size).await,
        Err(e) => Outcome::without_entry(Notice::rejected(&e)),
    }
}

/// [`send`], then append to the session's image log.
pub async fn generate(
    client: &BackendClient,
    state: &mut SessionState,
    prompt: &str,
    size: ImageSize,
) -> Notice {
    send(client, prompt, size)
        .await
        .apply_to(&mut state.generated)
}

pub async fn generate_from_form(
    client: &BackendClient,
    state: &mut SessionState,
    prompt: &str,
    size: &str,
) -> Notice {
    send_form(client, prompt, size)
        .await
        .apply_to(&mut state.generated)
}

pub fn clear(state: &mut SessionState) {
    state.clear(Tab::Generation);
}
