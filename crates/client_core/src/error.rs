//! Failure taxonomy and the display-message derivation used for every remote failure.

use serde_json::Value;
use shared::error::ApiErrorBody;
use thiserror::Error;

use crate::controller::View;

pub const AUTH_FALLBACK: &str = "Auth failed";
pub const ANALYSIS_FALLBACK: &str = "Analysis failed";
pub const HISTORY_FALLBACK: &str = "History fetch failed";
pub const MISSING_MEDIA_MESSAGE: &str = "Please choose an MP4 video";

/// A failed remote call, independent of the transport that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct RemoteFailure {
    pub status: Option<u16>,
    pub body: Option<ApiErrorBody>,
    pub message: String,
}

impl RemoteFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: Option<ApiErrorBody>) -> Self {
        Self {
            status: Some(status),
            body,
            message: format!("request failed with status code {status}"),
        }
    }

    pub fn with_body(mut self, body: ApiErrorBody) -> Self {
        self.body = Some(body);
        self
    }
}

/// Derives the user-facing text for a failed remote call.
///
/// Tries, in order: the body's `detail`, the body's `message`, the raw
/// failure message, and finally `fallback`. Blank values are skipped.
pub fn display_message(failure: &RemoteFailure, fallback: &str) -> String {
    let body = failure.body.as_ref();
    body.and_then(|body| field_text(body.detail.as_ref()))
        .or_else(|| body.and_then(|body| field_text(body.message.as_ref())))
        .or_else(|| non_blank(&failure.message))
        .unwrap_or_else(|| fallback.to_string())
}

fn field_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => non_blank(text),
        structured => Some(structured.to_string()),
    }
}

fn non_blank(text: &str) -> Option<String> {
    (!text.trim().is_empty()).then(|| text.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Analysis(String),
    #[error("{0}")]
    HistoryFetch(String),
    #[error("{command} is not available from the {state:?} view")]
    InvalidState { command: &'static str, state: View },
    #[error("session changed while {command} was in flight")]
    Superseded { command: &'static str },
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
