use bytes::Bytes;
use log::info;

use super::{Notice, Outcome};
use crate::api::{ApiError, BackendClient, Endpoint, FilePayload, Method};
use crate::session::{timestamp_now, AnalysisEntry, SessionState, Tab, UploadedImage};

/// Value for the file picker's `accept` attribute.
pub const ACCEPT_ATTR: &str = ".jpg,.jpeg,.png,image/jpeg,image/png";

const ACCEPTED: [(&str, &str); 3] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
];

/// Check a picked file and wrap it as a session-owned image.
///
/// Only JPG/JPEG/PNG are accepted, by extension and declared MIME type. A
/// missing or generic MIME type is inferred from the extension.
pub fn validate_upload(
    filename: &str,
    mime_type: &str,
    bytes: Bytes,
    max_bytes: usize,
) -> Result<UploadedImage, ApiError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    let Some((_, expected_mime)) = ACCEPTED.iter().find(|(ext, _)| *ext == extension) else {
        return Err(ApiError::validation(
            "image",
            format!("Unsupported image type for '{filename}'. Please upload a JPG, JPEG or PNG file."),
        ));
    };

    let mime_type = match mime_type.trim() {
        "" | "application/octet-stream" => expected_mime.to_string(),
        declared => declared.to_ascii_lowercase(),
    };
    if !ACCEPTED.iter().any(|(_, mime)| *mime == mime_type) {
        return Err(ApiError::validation(
            "image",
            format!("Unsupported image type '{mime_type}'. Please upload a JPG, JPEG or PNG file."),
        ));
    }

    if bytes.is_empty() {
        return Err(ApiError::validation("image", "The uploaded file is empty"));
    }
    if bytes.len() > max_bytes {
        return Err(ApiError::validation(
            "image",
            format!(
                "The uploaded file is {} bytes; the limit is {} bytes",
                bytes.len(),
                max_bytes
            ),
        ));
    }

    Ok(UploadedImage::new(filename, mime_type, bytes))
}

/// Store a picked image as the session's pending upload.
///
/// A rejected file leaves any previous pending upload in place.
pub fn select_upload(
    state: &mut SessionState,
    filename: &str,
    mime_type: &str,
    bytes: Bytes,
    max_bytes: usize,
) -> Notice {
    match validate_upload(filename, mime_type, bytes, max_bytes) {
        Ok(image) => {
            let notice = Notice::success(format!(
                "Uploaded {} ({}, {} bytes)",
                image.filename,
                image.mime_type,
                image.size()
            ));
            state.pending_upload = Some(image);
            notice
        }
        Err(e) => Notice::rejected(&e),
    }
}

/// Send `pending` for analysis without touching any session.
///
/// Only a successful analysis yields an entry; a failure is shown but leaves
/// the history unchanged.
pub async fn send(client: &BackendClient, pending: Option<UploadedImage>) -> Outcome<AnalysisEntry> {
    let Some(image) = pending else {
        return Outcome::without_entry(Notice::rejected(&ApiError::validation(
            "image",
            "Please upload an image first",
        )));
    };

    let file = FilePayload {
        filename: image.filename.clone(),
        mime_type: image.mime_type.clone(),
        bytes: image.bytes.clone(),
    };
    info!(
        "analyzing {} ({}, {} bytes)",
        file.filename,
        file.mime_type,
        file.bytes.len()
    );

    match client
        .call(Method::Post, Endpoint::ImageAnalysis, None, Some(&file))
        .await
    {
        Ok(result) => Outcome::recorded(
            AnalysisEntry {
                image,
                result,
                timestamp: timestamp_now(),
            },
            Notice::success("Analysis complete!"),
        ),
        Err(e) => Outcome::without_entry(Notice::error(format!("Analysis failed: {e}"))),
    }
}

/// Analyze the session's pending upload and record a success.
pub async fn analyze(client: &BackendClient, state: &mut SessionState) -> Notice {
    send(client, state.pending_upload.clone())
        .await
        .apply_to(&mut state.analyses)
}

pub fn clear(state: &mut SessionState) {
    state.clear(Tab::Analysis);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabs::NoticeLevel;
    use serde_json::json;

    const LIMIT: usize = 1024 * 1024;

    #[test]
    fn test_validate_accepts_jpg_jpeg_png() {
        for (name, mime) in [
            ("a.jpg", "image/jpeg"),
            ("b.JPEG", "image/jpeg"),
            ("c.png", "image/png"),
            ("d.png", ""),
        ] {
            let image = validate_upload(name, mime, Bytes::from_static(b"data"), LIMIT).unwrap();
            assert_eq!(image.filename, name);
        }
        let inferred = validate_upload("d.png", "", Bytes::from_static(b"data"), LIMIT).unwrap();
        assert_eq!(inferred.mime_type, "image/png");
    }

    #[test]
    fn test_validate_rejects_other_types() {
        for (name, mime) in [
            ("a.gif", "image/gif"),
            ("noext", "image/png"),
            ("b.png", "image/webp"),
            ("c.txt", "text/plain"),
        ] {
            let err = validate_upload(name, mime, Bytes::from_static(b"data"), LIMIT).unwrap_err();
            assert!(matches!(err, ApiError::Validation { field: "image", .. }));
        }
    }

    #[test]
    fn test_validate_rejects_empty_and_oversized() {
        assert!(validate_upload("a.png", "image/png", Bytes::new(), LIMIT).is_err());
        assert!(validate_upload("a.png", "image/png", Bytes::from(vec![0u8; 11]), 10).is_err());
        assert!(validate_upload("a.png", "image/png", Bytes::from(vec![0u8; 10]), 10).is_ok());
    }

    #[test]
    fn test_rejected_upload_keeps_previous_pending() {
        let mut state = SessionState::new();
        let ok = select_upload(&mut state, "a.png", "image/png", Bytes::from_static(b"1"), LIMIT);
        assert_eq!(ok.level, NoticeLevel::Success);
        let kept = state.pending_upload.clone();

        let bad = select_upload(&mut state, "b.gif", "image/gif", Bytes::from_static(b"2"), LIMIT);
        assert_eq!(bad.level, NoticeLevel::Warning);
        assert_eq!(state.pending_upload, kept);
    }

    #[tokio::test]
    async fn test_analyze_without_upload_issues_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/image")
            .expect(0)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();

        let notice = analyze(&client, &mut state).await;
        assert_eq!(notice, Notice::warning("Please upload an image first"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_analyze_success_records_entry() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/image")
            .with_status(200)
            .with_body(r#"{"description":"a dog on grass"}"#)
            .expect(1)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();
        select_upload(&mut state, "dog.jpg", "image/jpeg", Bytes::from_static(b"jpeg"), LIMIT);
        let uploaded = state.pending_upload.clone().unwrap();

        let notice = analyze(&client, &mut state).await;

        assert_eq!(notice, Notice::success("Analysis complete!"));
        assert_eq!(state.analyses.len(), 1);
        let entry = state.analyses.last().unwrap();
        assert_eq!(entry.result, json!({ "description": "a dog on grass" }));
        assert_eq!(entry.image, uploaded);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_analyze_failure_records_nothing() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/image")
            .with_status(400)
            .with_body(r#"{"error":"File must be an image"}"#)
            .create_async()
            .await;
        let client = BackendClient::new(server.url());
        let mut state = SessionState::new();
        select_upload(&mut state, "a.png", "image/png", Bytes::from_static(b"png"), LIMIT);

        let notice = analyze(&client, &mut state).await;

        assert!(notice.is_error());
        assert!(notice.text.starts_with("Analysis failed: 400 error for url:"));
        assert!(notice.text.contains("File must be an image"));
        assert!(state.analyses.is_empty());
        assert!(state.pending_upload.is_some());
    }
}
