//! Response classification: redirect, JSON, or HTML in; one [`Outcome`] out.
//!
//! The backend answers the same logical operation with a redirect, a JSON
//! envelope, or a rendered HTML page depending on endpoint and mood. Stages
//! never look at raw responses themselves; they hand them to [`Classifier`].
//!
//! Decision order:
//!
//! 1. 301/302/303/307/308 → `Success` (a redirect after a form post is how
//!    the backend says "done").
//! 2. JSON content type, or a body starting with `{` → `ok` truthy means
//!    `Success` carrying `message_list`; anything else is `SoftFailure`.
//! 3. HTML: an error marker in the first [`SCAN_LIMIT`] characters →
//!    `SoftFailure`; a success marker anywhere → `Success`; a bare 200 →
//!    `PendingVerification`; any other status → `HardFailure`.
//! 4. For a bare 200 on a content-affecting call, a message found in one of
//!    the feedback containers downgrades the result to `SoftFailure`.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::outcome::{BackendMessage, Outcome};

/// Characters of an HTML body scanned for error markers.
pub const SCAN_LIMIT: usize = 2000;
/// Characters kept when quoting a body back in a failure message.
pub const EXCERPT_LIMIT: usize = 500;
/// Extracted feedback shorter than this is treated as layout noise.
pub const MIN_FEEDBACK_CHARS: usize = 10;

pub const REDIRECT_STATUSES: &[u16] = &[301, 302, 303, 307, 308];

pub const DEFAULT_ERROR_MARKERS: &[&str] = &[
    "error:",
    "invalid",
    "cannot",
    "failed",
    "permission denied",
    "you do not have permission",
    "access denied",
];

pub const DEFAULT_SUCCESS_MARKERS: &[&str] = &["success", "submitted", "saved"];

pub const DEFAULT_FEEDBACK_PATTERNS: &[&str] = &[
    r#"(?is)<div[^>]*class="[^"]*revcard-feedback[^"]*"[^>]*>(.*?)</div>"#,
    r#"(?is)<div[^>]*class="[^"]*feedback[^"]*is-error[^"]*"[^>]*>(.*?)</div>"#,
    r#"(?is)<div[^>]*class="[^"]*message[^"]*error[^"]*"[^>]*>(.*?)</div>"#,
    r#"(?is)<div[^>]*class="[^"]*message-list[^"]*"[^>]*>(.*?)</div>"#,
];

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("invalid feedback pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Raw HTTP response as captured by the transport. Redirects are not followed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are stored lower-cased.
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_redirect(&self) -> bool {
        REDIRECT_STATUSES.contains(&self.status)
    }

    pub fn is_success_status(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn looks_like_json(&self) -> bool {
        self.header("content-type")
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"))
            || self.body.trim_start().starts_with('{')
    }

    /// Parse the body as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        if !self.looks_like_json() {
            return None;
        }
        serde_json::from_str(self.body.trim()).ok()
    }

    /// The first [`EXCERPT_LIMIT`] characters of the body, trimmed.
    pub fn excerpt(&self) -> String {
        self.body
            .chars()
            .take(EXCERPT_LIMIT)
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Whether a call touches review content and so deserves a look inside
/// ambiguous HTML pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inspection {
    Content,
    StatusOnly,
}

/// The matching-pattern table plus the decision procedure over it.
#[derive(Debug, Clone)]
pub struct Classifier {
    error_markers: Vec<String>,
    success_markers: Vec<String>,
    feedback: Vec<Regex>,
    tag: Regex,
}

impl Classifier {
    /// Build a classifier with the default marker and feedback tables.
    pub fn new() -> Result<Self, ClassifyError> {
        let mut classifier = Self {
            error_markers: DEFAULT_ERROR_MARKERS.iter().map(|m| m.to_string()).collect(),
            success_markers: DEFAULT_SUCCESS_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            feedback: Vec::new(),
            tag: compile(r"<[^>]+>")?,
        };
        for pattern in DEFAULT_FEEDBACK_PATTERNS {
            classifier = classifier.with_feedback_pattern(pattern)?;
        }
        Ok(classifier)
    }

    /// Add an error marker. Matching is case-insensitive.
    pub fn with_error_marker(mut self, marker: &str) -> Self {
        self.error_markers.push(marker.to_lowercase());
        self
    }

    /// Add a success marker. Matching is case-insensitive.
    pub fn with_success_marker(mut self, marker: &str) -> Self {
        self.success_markers.push(marker.to_lowercase());
        self
    }

    /// Add a feedback-container pattern. Capture group 1 is the message.
    pub fn with_feedback_pattern(mut self, pattern: &str) -> Result<Self, ClassifyError> {
        self.feedback.push(compile(pattern)?);
        Ok(self)
    }

    /// Classify one response. Pure: the same input always yields the same outcome.
    pub fn classify(&self, response: &RawResponse, inspection: Inspection) -> Outcome {
        if response.is_redirect() {
            debug!(
                status = response.status,
                location = response.header("location").unwrap_or_default(),
                "redirect treated as success"
            );
            return Outcome::success();
        }

        if response.looks_like_json() {
            match serde_json::from_str::<Value>(response.body.trim()) {
                Ok(reply) => return classify_json(&reply),
                Err(err) => debug!(error = %err, "body looked like JSON but did not parse"),
            }
        }

        self.classify_html(response, inspection)
    }

    fn classify_html(&self, response: &RawResponse, inspection: Inspection) -> Outcome {
        let head = response
            .body
            .chars()
            .take(SCAN_LIMIT)
            .collect::<String>()
            .to_lowercase();
        if let Some(marker) = self.error_markers.iter().find(|m| head.contains(m.as_str())) {
            return Outcome::soft(format!(
                "HTML response contains error marker {marker:?}: {}",
                response.excerpt()
            ));
        }

        let body = response.body.to_lowercase();
        if self.success_markers.iter().any(|m| body.contains(m.as_str())) {
            return Outcome::success();
        }

        if response.status != 200 {
            return Outcome::hard(format!(
                "unexpected HTTP {} with HTML body: {}",
                response.status,
                response.excerpt()
            ));
        }

        if inspection == Inspection::Content
            && let Some(feedback) = self.feedback_message(&response.body)
        {
            return Outcome::soft(format!("HTML response contains error: {feedback}"));
        }

        Outcome::PendingVerification
    }

    /// Best-effort extraction of a message from the known feedback containers.
    pub fn feedback_message(&self, html: &str) -> Option<String> {
        self.feedback.iter().find_map(|pattern| {
            pattern.captures_iter(html).find_map(|caps| {
                let inner = caps.get(1)?.as_str();
                let text = self.tag.replace_all(inner, " ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                (text.chars().count() > MIN_FEEDBACK_CHARS).then_some(text)
            })
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ClassifyError> {
    Regex::new(pattern).map_err(|source| ClassifyError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn classify_json(reply: &Value) -> Outcome {
    let messages = BackendMessage::list_from_json(reply);
    if reply.get("ok").is_some_and(is_truthy) {
        return Outcome::Success { messages };
    }

    let message = if messages.is_empty() {
        ["error", "errors", "message"]
            .iter()
            .find_map(|k| reply.get(*k))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "backend reported failure".to_string())
    } else {
        messages
            .iter()
            .map(BackendMessage::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    };
    Outcome::SoftFailure { message, messages }
}

/// Loose truthiness of a JSON value, as the backend's `ok` flag is not always a bool.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}
