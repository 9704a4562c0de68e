use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum characters of the raw webhook body kept in the audit log.
pub const PAYLOAD_PREVIEW_CHARS: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookLogStatus {
    Ok,
    Error,
}

impl WebhookLogStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WebhookLogStatus::Ok => "ok",
            WebhookLogStatus::Error => "error",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ok" => Some(WebhookLogStatus::Ok),
            "error" => Some(WebhookLogStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWebhookLog {
    pub event_type: String,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub status: WebhookLogStatus,
    pub error_message: Option<String>,
    pub payload_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookLog {
    pub id: i64,
    pub event_type: String,
    pub order_id: Option<String>,
    pub order_number: Option<String>,
    pub status: WebhookLogStatus,
    pub error_message: Option<String>,
    pub payload_preview: String,
    pub received_at: DateTime<Utc>,
}

/// Compact JSON rendering of `payload`, cut at [`PAYLOAD_PREVIEW_CHARS`] characters.
#[must_use]
pub fn payload_preview(payload: &Value) -> String {
    let rendered = payload.to_string();
    match rendered.char_indices().nth(PAYLOAD_PREVIEW_CHARS) {
        Some((cut, _)) => rendered[..cut].to_string(),
        None => rendered,
    }
}
