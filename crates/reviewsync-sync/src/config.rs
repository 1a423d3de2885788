//! Process-wide settings, built once at startup and handed to the transport
//! and the importer by value.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reviewsync_core::ContentFields;
use serde::{Deserialize, Serialize};

use crate::SyncError;

/// A bounded retry budget with fixed spacing between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval_ms: u64,
}

impl RetryPolicy {
    pub const fn new(attempts: u32, interval_ms: u64) -> Self {
        Self {
            attempts,
            interval_ms,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// At least one attempt is always made.
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

/// Every wait and retry budget the stages use.
///
/// Defaults are tuned to the backend's observed read-after-write lag. Any
/// subset can be overridden from JSON; missing keys keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Wait between a successful assignment and the first acceptance attempt.
    #[serde(alias = "post_assign_settle")]
    pub post_assign_settle_ms: u64,
    /// Record lookups before accepting a freshly assigned review.
    pub accept_lookup: RetryPolicy,
    /// Wait before the single retry of a rejected accept call.
    #[serde(alias = "accept_retry_delay")]
    pub accept_retry_delay_ms: u64,
    /// Wait after the submitter's own accept call.
    #[serde(alias = "post_accept_settle")]
    pub post_accept_settle_ms: u64,
    /// Record lookups before submitting (the identifier may lag assignment).
    pub submit_lookup: RetryPolicy,
    /// Wait before re-reading a record after a submit that came back with warnings.
    #[serde(alias = "warning_recheck_delay")]
    pub warning_recheck_delay_ms: u64,
    /// Wait between the draft save and the final submit of the fallback path.
    #[serde(alias = "draft_to_submit_delay")]
    pub draft_to_submit_delay_ms: u64,
    /// Wait before the first verification read.
    #[serde(alias = "verify_settle")]
    pub verify_settle_ms: u64,
    pub verify: RetryPolicy,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            post_assign_settle_ms: 2000,
            accept_lookup: RetryPolicy::new(3, 500),
            accept_retry_delay_ms: 1000,
            post_accept_settle_ms: 300,
            submit_lookup: RetryPolicy::new(5, 500),
            warning_recheck_delay_ms: 1500,
            draft_to_submit_delay_ms: 1000,
            verify_settle_ms: 2000,
            verify: RetryPolicy::new(3, 1000),
        }
    }
}

impl Pacing {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn post_assign_settle(&self) -> Duration {
        Duration::from_millis(self.post_assign_settle_ms)
    }

    pub fn accept_retry_delay(&self) -> Duration {
        Duration::from_millis(self.accept_retry_delay_ms)
    }

    pub fn post_accept_settle(&self) -> Duration {
        Duration::from_millis(self.post_accept_settle_ms)
    }

    pub fn warning_recheck_delay(&self) -> Duration {
        Duration::from_millis(self.warning_recheck_delay_ms)
    }

    pub fn draft_to_submit_delay(&self) -> Duration {
        Duration::from_millis(self.draft_to_submit_delay_ms)
    }

    pub fn verify_settle(&self) -> Duration {
        Duration::from_millis(self.verify_settle_ms)
    }
}

/// Backend location, credentials and run mode.
#[derive(Clone)]
pub struct SyncConfig {
    /// Like `https://reviews.example.org` (no trailing slash).
    pub base_url: String,
    pub token: String,
    /// Simulation mode: every request path carries `dry_run=1`.
    pub dry_run: bool,
    pub timeout: Duration,
    pub pacing: Pacing,
    /// Where ambiguous submit responses are archived for inspection.
    pub debug_html_dir: Option<PathBuf>,
    /// Review fields whose values count as persisted content.
    pub content_fields: ContentFields,
}

impl SyncConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Validate and normalise the base URL; the token must not be blank.
    pub fn new(base_url: &str, token: &str) -> Result<Self, SyncError> {
        let base_url = base_url.trim().trim_end_matches('/');
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SyncError::InvalidBaseUrl(base_url.to_string()));
        }
        if token.trim().is_empty() {
            return Err(SyncError::MissingToken);
        }
        Ok(Self {
            base_url: base_url.to_string(),
            token: token.trim().to_string(),
            dry_run: false,
            timeout: Self::DEFAULT_TIMEOUT,
            pacing: Pacing::default(),
            debug_html_dir: None,
            content_fields: ContentFields::default(),
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_debug_html_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_html_dir = dir;
        self
    }

    pub fn with_content_field(mut self, id: &str) -> Self {
        self.content_fields = self.content_fields.with_field(id);
        self
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .field("pacing", &self.pacing)
            .field("debug_html_dir", &self.debug_html_dir)
            .field("content_fields", &self.content_fields)
            .finish()
    }
}
