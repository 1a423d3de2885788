//! The single result currency passed between pipeline stages.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// One entry of the backend's `message_list`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendMessage {
    pub field: Option<String>,
    pub message: String,
    /// Severity as reported by the backend; 2 and above are errors.
    pub status: i64,
}

impl BackendMessage {
    pub const ERROR: i64 = 2;

    /// Decode a `message_list` entry leniently. Bare strings become messages
    /// with severity 0; anything else that is not an object is skipped.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self {
                message: s.clone(),
                ..Self::default()
            }),
            Value::Object(obj) => Some(Self {
                field: obj.get("field").and_then(Value::as_str).map(str::to_string),
                message: obj
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                status: obj
                    .get("status")
                    .and_then(|s| s.as_i64().or_else(|| s.as_str()?.trim().parse().ok()))
                    .unwrap_or(0),
            }),
            _ => None,
        }
    }

    /// Decode the `message_list` array of a JSON reply, if any.
    pub fn list_from_json(reply: &Value) -> Vec<Self> {
        reply
            .get("message_list")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Self::from_json).collect())
            .unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        self.status >= Self::ERROR
    }
}

impl fmt::Display for BackendMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) if !field.is_empty() => write!(f, "{field}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Coarse class of an [`Outcome`], used where only the shape matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    PendingVerification,
    SoftFailure,
    HardFailure,
}

/// What the backend made of one call, as decided by the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The backend confirmed the operation. `messages` carries any
    /// accompanying `message_list`, which may include warnings.
    Success { messages: Vec<BackendMessage> },
    /// A 200 response with no success or error evidence; only a re-read of
    /// the record can settle it.
    PendingVerification,
    /// The backend rejected the operation with a diagnosable message.
    SoftFailure {
        message: String,
        messages: Vec<BackendMessage>,
    },
    /// Unexpected status, or a required identifier never appeared.
    HardFailure { message: String },
}

impl Outcome {
    pub fn success() -> Self {
        Outcome::Success {
            messages: Vec::new(),
        }
    }

    pub fn soft(message: impl Into<String>) -> Self {
        Outcome::SoftFailure {
            message: message.into(),
            messages: Vec::new(),
        }
    }

    pub fn hard(message: impl Into<String>) -> Self {
        Outcome::HardFailure {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success { .. } => OutcomeKind::Success,
            Outcome::PendingVerification => OutcomeKind::PendingVerification,
            Outcome::SoftFailure { .. } => OutcomeKind::SoftFailure,
            Outcome::HardFailure { .. } => OutcomeKind::HardFailure,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Success, confirmed or pending verification.
    pub fn is_tentative_success(&self) -> bool {
        matches!(self, Outcome::Success { .. } | Outcome::PendingVerification)
    }

    pub fn is_failure(&self) -> bool {
        !self.is_tentative_success()
    }

    /// A confirmed success whose message list still carries error-severity entries.
    pub fn has_error_messages(&self) -> bool {
        match self {
            Outcome::Success { messages } => messages.iter().any(BackendMessage::is_error),
            _ => false,
        }
    }

    pub fn messages(&self) -> &[BackendMessage] {
        match self {
            Outcome::Success { messages } | Outcome::SoftFailure { messages, .. } => {
                messages.as_slice()
            }
            Outcome::PendingVerification | Outcome::HardFailure { .. } => &[],
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Outcome::SoftFailure { message, .. } | Outcome::HardFailure { message } => {
                Some(message.as_str())
            }
            Outcome::Success { .. } | Outcome::PendingVerification => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { messages } if messages.is_empty() => f.write_str("success"),
            Outcome::Success { messages } => {
                write!(f, "success with {} message(s)", messages.len())
            }
            Outcome::PendingVerification => f.write_str("pending verification"),
            Outcome::SoftFailure { message, .. } => write!(f, "rejected: {message}"),
            Outcome::HardFailure { message } => write!(f, "failed: {message}"),
        }
    }
}
