use bytes::Bytes;
use log::{debug, warn};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::{CHAT_ANALYSIS_KEY_VAR, IMAGE_GENERATION_KEY_VAR};

// ── Endpoints and their auth mapping ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Backend operations the dashboard invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /` liveness probe.
    Health,
    /// `POST /chat` with `{content}`.
    Chat,
    /// `POST /image` with a multipart `image` field.
    ImageAnalysis,
    /// `POST /image-generator` with `{prompt, size}`.
    ImageGeneration,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Health => "/",
            Self::Chat => "/chat",
            Self::ImageAnalysis => "/image",
            Self::ImageGeneration => "/image-generator",
        }
    }

    /// Which provider key a 401 from this endpoint points at.
    ///
    /// `None` means a 401 is reported like any other HTTP error.
    pub fn auth_scope(&self) -> Option<KeyScope> {
        match self {
            Self::Chat | Self::ImageAnalysis => Some(KeyScope::ChatAnalysis),
            Self::ImageGeneration => Some(KeyScope::ImageGeneration),
            Self::Health => None,
        }
    }
}

/// The two provider keys the backend needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyScope {
    /// Groq key, used by chat and image analysis.
    ChatAnalysis,
    /// Azure OpenAI key, used by image generation.
    ImageGeneration,
}

impl KeyScope {
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::ChatAnalysis => CHAT_ANALYSIS_KEY_VAR,
            Self::ImageGeneration => IMAGE_GENERATION_KEY_VAR,
        }
    }

    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::ChatAnalysis => "GROQ",
            Self::ImageGeneration => "Azure OpenAI",
        }
    }

    pub fn missing_key_message(&self) -> String {
        format!(
            "{} API Key not configured. Please set the {} environment variable.",
            self.provider_name(),
            self.env_var()
        )
    }
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Every way a dashboard interaction can fail.
///
/// The `Display` text is what the user sees inline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("{}", .scope.missing_key_message())]
    AuthMissing { endpoint: Endpoint, scope: KeyScope },

    #[error("Could not connect to the API server. Please make sure the backend service is running.")]
    Unreachable,

    #[error("{status} error for url: {url}{}", detail_suffix(.detail))]
    HttpError {
        status: u16,
        url: String,
        detail: Option<String>,
    },

    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{detail}")]
    Transport { detail: String },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({d})"),
        None => String::new(),
    }
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Short name of the error kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthMissing { .. } => "auth_missing",
            Self::Unreachable => "unreachable",
            Self::HttpError { .. } => "http_error",
            Self::Validation { .. } => "validation",
            Self::Transport { .. } => "transport",
        }
    }
}

/// Serializable `{error}` shape stored in place of a failed result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

impl From<&ApiError> for ErrorMessage {
    fn from(err: &ApiError) -> Self {
        Self {
            error: err.to_string(),
        }
    }
}

// ── Request helper ──────────────────────────────────────────────────────

/// Raw image sent as the multipart `image` field.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl FilePayload {
    fn to_form(&self) -> Result<Form, ApiError> {
        let part = Part::bytes(self.bytes.to_vec())
            .file_name(self.filename.clone())
            .mime_str(&self.mime_type)
            .map_err(|_| {
                ApiError::validation("image", format!("Invalid MIME type '{}'", self.mime_type))
            })?;
        Ok(Form::new().part("image", part))
    }
}

/// HTTP client for the backend service.
///
/// No retries and no timeout: a failed call is final for that interaction.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    /// Issue exactly one request and map the outcome.
    ///
    /// A POST with `file` is sent as multipart (`image` field); otherwise
    /// `body`, when present, is sent as JSON. An empty success body yields
    /// `{"status": "success"}`.
    pub async fn call(
        &self,
        method: Method,
        endpoint: Endpoint,
        body: Option<&Value>,
        file: Option<&FilePayload>,
    ) -> Result<Value, ApiError> {
        let url = self.url_for(endpoint);
        debug!("{} {}", method.as_str(), url);

        let result = self.send(method, endpoint, &url, body, file).await;
        match &result {
            Err(ApiError::AuthMissing { endpoint, scope }) => warn!(
                "{} {} rejected with 401: {:?} needs {} on the backend",
                method.as_str(),
                url,
                endpoint,
                scope.env_var()
            ),
            Err(e) => warn!("{} {} failed [{}]: {}", method.as_str(), url, e.kind(), e),
            Ok(_) => {}
        }
        result
    }

    async fn send(
        &self,
        method: Method,
        endpoint: Endpoint,
        url: &str,
        body: Option<&Value>,
        file: Option<&FilePayload>,
    ) -> Result<Value, ApiError> {
        let request = match method {
            Method::Get => self.http.get(url),
            Method::Post => {
                let request = self.http.post(url);
                match (file, body) {
                    (Some(file), _) => request.multipart(file.to_form()?),
                    (None, Some(body)) => request.json(body),
                    (None, None) => request,
                }
            }
        };

        let response = request.send().await.map_err(classify_send_error)?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Some(scope) = endpoint.auth_scope() {
                return Err(ApiError::AuthMissing { endpoint, scope });
            }
        }

        let content = response.bytes().await.map_err(|e| ApiError::Transport {
            detail: format!("Failed to read response from {url}: {e}"),
        })?;

        if !status.is_success() {
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                url: url.to_string(),
                detail: backend_error_detail(&content),
            });
        }

        if content.is_empty() {
            return Ok(json!({ "status": "success" }));
        }

        serde_json::from_slice(&content).map_err(|e| ApiError::Transport {
            detail: format!("Invalid JSON in response from {url}: {e}"),
        })
    }

    /// `GET /` liveness probe. Only a 200 counts as reachable.
    pub async fn probe(&self) -> Result<(), ApiError> {
        let url = self.url_for(Endpoint::Health);
        debug!("probe {}", url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(classify_send_error)?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(ApiError::HttpError {
                status: response.status().as_u16(),
                url,
                detail: None,
            })
        }
    }
}

fn classify_send_error(e: reqwest::Error) -> ApiError {
    if e.is_connect() {
        ApiError::Unreachable
    } else {
        ApiError::Transport {
            detail: e.to_string(),
        }
    }
}

/// Pull the backend's own `{"error": "..."}` text out of an error body.
fn backend_error_detail(content: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(content).ok()?;
    value
        .get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
}
