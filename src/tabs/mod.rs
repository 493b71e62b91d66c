//! Tab controllers: each turns one user action into at most one backend
//! call and a state transition on the session.

pub mod analysis;
pub mod chat;
pub mod generation;

use crate::api::ApiError;
use crate::session::InteractionLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Inline message shown under a tab after an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
    /// Second line, shown verbatim below `text`.
    pub detail: Option<String>,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
            detail: None,
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            text: text.into(),
            detail: None,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Input rejected before any request was made.
    pub fn rejected(err: &ApiError) -> Self {
        Self::warning(err.to_string())
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }

    pub fn css_class(&self) -> &'static str {
        match self.level {
            NoticeLevel::Success => "notice-success",
            NoticeLevel::Warning => "notice-warning",
            NoticeLevel::Error => "notice-error",
        }
    }
}

/// What one tab action produced, computed without touching the session.
///
/// The backend call runs first; the session is only locked afterwards to
/// append `entry` through [`Outcome::apply_to`].
#[derive(Debug)]
pub struct Outcome<T> {
    pub notice: Notice,
    pub entry: Option<T>,
}

impl<T> Outcome<T> {
    pub fn recorded(entry: T, notice: Notice) -> Self {
        Self {
            notice,
            entry: Some(entry),
        }
    }

    /// Nothing to append: refused input or a failure that is not logged.
    pub fn without_entry(notice: Notice) -> Self {
        Self {
            notice,
            entry: None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        self.entry.is_some()
    }

    pub fn apply_to(self, log: &mut InteractionLog<T>) -> Notice {
        if let Some(entry) = self.entry {
            log.push(entry);
        }
        self.notice
    }
}

/// The text as typed, or a validation error naming `field` when it is blank.
pub(crate) fn require_text(
    field: &'static str,
    value: &str,
    message: &str,
) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ApiError::validation(field, message))
    } else {
        Ok(value.to_string())
    }
}
