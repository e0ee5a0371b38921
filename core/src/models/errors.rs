//! Error envelope DTOs returned to clients on 4xx/5xx responses.

use serde::{Deserialize, Serialize};

/// One error, matching the OpenAI-style `error` object shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Response body for any error. `detail` duplicates the message flatly for
/// clients that only look at a top-level string field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: ErrorDetail {
                message: message.clone(),
                kind: kind.into(),
                param: None,
                code: None,
            },
            detail: message,
        }
    }
}
