use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body returned by the analysis service on 4xx/5xx responses.
///
/// Either field may be a plain string or structured JSON, so both are kept raw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Value>,
}

impl ApiErrorBody {
    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            detail: Some(Value::String(detail.into())),
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            detail: None,
            message: Some(Value::String(message.into())),
        }
    }
}
