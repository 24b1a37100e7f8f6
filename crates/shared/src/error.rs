use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// 400: the backend judged the payload irrelevant or malformed.
    Rejected,
    Unauthorized,
    /// 403: the per-account contribution quota is spent.
    QuotaExceeded,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::Rejected,
            401 => Self::Unauthorized,
            403 => Self::QuotaExceeded,
            404 => Self::NotFound,
            422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Backend failure normalized from the `detail` payload shapes the API emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub status: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Machine tag from `detail.error`, e.g. `quota_exceeded`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ApiError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::from_status(status),
            status,
            message: message.into(),
            reasoning: None,
            reason: None,
            current_count: None,
            limit: None,
        }
    }

    /// Builds an error from a non-success response body.
    ///
    /// Accepted shapes: `{"detail": "text"}`, `{"detail": [{loc, msg}, ..]}`,
    /// `{"detail": {"message"|"error", "reasoning"?, ..}}`, the same object
    /// without the `detail` wrapper, or a non-JSON body.
    pub fn from_response_body(status: u16, body: &str) -> Self {
        let fallback = format!("HTTP error! status: {status}");
        let parsed: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(_) => {
                let text = body.trim();
                return Self::new(status, if text.is_empty() { fallback } else { text.to_string() });
            }
        };
        let detail = parsed.get("detail").unwrap_or(&parsed);

        match detail {
            Value::String(text) => Self::new(status, text.clone()),
            Value::Array(items) => {
                let fields = items
                    .iter()
                    .map(format_field_error)
                    .collect::<Vec<_>>()
                    .join(", ");
                Self::new(status, format!("Validation error: {fields}"))
            }
            Value::Object(map) => {
                let text_field = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
                let message = text_field("message")
                    .or_else(|| text_field("error"))
                    .unwrap_or(fallback);
                let mut err = Self::new(status, message);
                err.reasoning = text_field("reasoning");
                err.reason = text_field("error");
                err.current_count = map.get("current_count").and_then(Value::as_u64);
                err.limit = map.get("limit").and_then(Value::as_u64);
                err
            }
            _ => Self::new(status, fallback),
        }
    }

    pub fn is_relevance_rejection(&self) -> bool {
        self.code == ErrorCode::Rejected
    }

    pub fn is_quota_exceeded(&self) -> bool {
        self.code == ErrorCode::QuotaExceeded
    }

    pub fn is_unauthorized(&self) -> bool {
        self.code == ErrorCode::Unauthorized
    }
}

fn format_field_error(item: &Value) -> String {
    let field = item
        .get("loc")
        .and_then(Value::as_array)
        .map(|loc| {
            loc.iter()
                .map(|part| match part {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_else(|| "field".to_string());
    let msg = item.get("msg").and_then(Value::as_str).unwrap_or("invalid");
    format!("{field}: {msg}")
}
