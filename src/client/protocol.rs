//! Wire messages exchanged with the analysis backend.
//!
//! All frames are JSON text. The client sends an optional token frame and a
//! `user_authentication` frame; the backend streams `analysis_result` frames
//! and a few acknowledgement types that the dashboard only logs.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::error::MessageError;

// ---------------------------------------------------------------------------
// Client → backend
// ---------------------------------------------------------------------------

/// Optional first handshake frame: `{ "token": "..." }`.
#[derive(Debug, Serialize)]
pub struct TokenMessage<'a> {
    pub token: &'a str,
}

/// Identification frame: `{ "type": "user_authentication", "userId", "sessionId" }`.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename = "user_authentication", rename_all = "camelCase")]
pub struct AuthenticationMessage<'a> {
    pub user_id: &'a str,
    pub session_id: &'a str,
}

// ---------------------------------------------------------------------------
// Backend → client
// ---------------------------------------------------------------------------

/// Alert attached to an analysis result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Alert {
    pub level: String,
    pub message: String,
    /// Suggested follow-up, sent with high-level alerts.
    #[serde(default)]
    pub recommended_action: Option<String>,
}

/// A risk analysis pushed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub risk_score: f64,
    /// A malformed alert is skipped; the score still renders.
    #[serde(default, deserialize_with = "lenient_alert")]
    pub alert: Option<Alert>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn lenient_alert<'de, D>(deserializer: D) -> Result<Option<Alert>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => match serde_json::from_value(raw) {
            Ok(alert) => Ok(Some(alert)),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed alert");
                Ok(None)
            }
        },
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    AnalysisResult(AnalysisResult),
    AuthenticationSuccess { user_id: Option<String> },
    ServerError { message: String },
    FeedbackReceived { message: String },
    /// Any other shape: no `type`, or a type the dashboard does not handle.
    Ignored { kind: Option<String> },
}

/// Classify a text frame.
///
/// Invalid JSON is [`MessageError::Malformed`]. An `analysis_result` frame
/// that does not carry a numeric `riskScore` is [`MessageError::InvalidResult`].
/// Every other well-formed JSON value is classified, never rejected.
pub fn parse_inbound(text: &str) -> Result<Inbound, MessageError> {
    let value: Value = serde_json::from_str(text).map_err(MessageError::Malformed)?;

    let kind = value.get("type").and_then(Value::as_str).map(str::to_string);
    let message_field = || {
        value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let inbound = match kind.as_deref() {
        Some("analysis_result") => Inbound::AnalysisResult(
            serde_json::from_value(value.clone()).map_err(MessageError::InvalidResult)?,
        ),
        Some("authentication_success") => Inbound::AuthenticationSuccess {
            user_id: value
                .get("userId")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        Some("error") => Inbound::ServerError {
            message: message_field(),
        },
        Some("feedback_received") => Inbound::FeedbackReceived {
            message: message_field(),
        },
        _ => Inbound::Ignored { kind },
    };

    Ok(inbound)
}
