//! Per-user session state: three append-only interaction logs plus the
//! image currently picked on the analysis tab.

use bytes::Bytes;
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::api::{ApiError, ErrorMessage};

/// Local wall-clock timestamp in the dashboard's display format.
pub fn timestamp_now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

// ── Append-only log ─────────────────────────────────────────────────────

/// Ordered, append-only sequence of entries.
///
/// Entries are never mutated once pushed; the only removal is a full clear.
#[derive(Debug, Clone)]
pub struct InteractionLog<T> {
    entries: Vec<T>,
}

impl<T> Default for InteractionLog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> InteractionLog<T> {
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in the order they were appended.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    /// Entries newest-first, each paired with its 1-based chronological number.
    pub fn newest_first(&self) -> impl Iterator<Item = (usize, &T)> {
        self.entries
            .iter()
            .enumerate()
            .rev()
            .map(|(idx, entry)| (idx + 1, entry))
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }
}

// ── Entries ─────────────────────────────────────────────────────────────

/// What the backend answered to one chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatReply {
    Reply { response: String },
    Failed(ErrorMessage),
}

impl ChatReply {
    /// Reply text from a successful `/chat` result.
    pub fn from_result(result: &Value) -> Self {
        let response = result
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or("No response")
            .to_string();
        Self::Reply { response }
    }

    pub fn from_error(err: &ApiError) -> Self {
        Self::Failed(ErrorMessage::from(err))
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(&msg.error),
            Self::Reply { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEntry {
    pub message: String,
    pub response: ChatReply,
    pub timestamp: String,
}

/// An image picked on the analysis tab, owned by the session.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub id: Uuid,
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Path under which the dashboard serves this image.
    pub fn serve_path(&self) -> String {
        format!("/analysis/image/{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisEntry {
    pub image: UploadedImage,
    pub result: Value,
    pub timestamp: String,
}

/// Resolutions the generation backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "1024x1024")]
    Square,
    #[serde(rename = "1792x1024")]
    Landscape,
    #[serde(rename = "1024x1792")]
    Portrait,
}

impl ImageSize {
    pub const ALL: [ImageSize; 3] = [Self::Square, Self::Landscape, Self::Portrait];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Square => "1024x1024",
            Self::Landscape => "1792x1024",
            Self::Portrait => "1024x1792",
        }
    }
}

impl fmt::Display for ImageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s.trim())
            .ok_or_else(|| ApiError::validation("size", format!("Unsupported image size '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedImageEntry {
    pub prompt: String,
    pub url: String,
    pub size: ImageSize,
    pub timestamp: String,
}

// ── Session state ───────────────────────────────────────────────────────

/// Which tab (and log) an action belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Chat,
    Analysis,
    Generation,
}

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub chat: InteractionLog<ChatEntry>,
    pub analyses: InteractionLog<AnalysisEntry>,
    pub generated: InteractionLog<GeneratedImageEntry>,
    pub pending_upload: Option<UploadedImage>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty one log; the other two are untouched.
    pub fn clear(&mut self, tab: Tab) {
        match tab {
            Tab::Chat => self.chat.clear(),
            Tab::Analysis => self.analyses.clear(),
            Tab::Generation => self.generated.clear(),
        }
    }

    pub fn log_len(&self, tab: Tab) -> usize {
        match tab {
            Tab::Chat => self.chat.len(),
            Tab::Analysis => self.analyses.len(),
            Tab::Generation => self.generated.len(),
        }
    }

    /// Look up a session-owned image, pending or already analyzed.
    pub fn find_image(&self, id: Uuid) -> Option<&UploadedImage> {
        self.pending_upload
            .iter()
            .chain(self.analyses.iter().map(|entry| &entry.image))
            .find(|image| image.id == id)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            chat: self.chat.iter().cloned().collect(),
            analyses: self
                .analyses
                .iter()
                .map(|entry| AnalysisSnapshot {
                    image_url: entry.image.serve_path(),
                    filename: entry.image.filename.clone(),
                    mime_type: entry.image.mime_type.clone(),
                    result: entry.result.clone(),
                    timestamp: entry.timestamp.clone(),
                })
                .collect(),
            generated: self.generated.iter().cloned().collect(),
        }
    }
}

/// JSON view of a session's logs, without image bytes.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub chat: Vec<ChatEntry>,
    pub analyses: Vec<AnalysisSnapshot>,
    pub generated: Vec<GeneratedImageEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSnapshot {
    pub image_url: String,
    pub filename: String,
    pub mime_type: String,
    pub result: Value,
    pub timestamp: String,
}
