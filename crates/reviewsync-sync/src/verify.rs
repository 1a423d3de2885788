//! Verification Poller: the final word on whether a submit took effect.

use reviewsync_core::ReviewRecord;
use tracing::{debug, info, warn};

use crate::SyncError;
use crate::config::Pacing;
use crate::reader::ReviewReader;
use crate::remote::Remote;

/// Result of re-reading a review after a submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The record moved past `Acknowledged` or carries content.
    Confirmed(ReviewRecord),
    /// The budget ran out; holds the last record read, if any.
    Unconfirmed(Option<ReviewRecord>),
}

impl Verification {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Verification::Confirmed(_))
    }

    pub fn record(&self) -> Option<&ReviewRecord> {
        match self {
            Verification::Confirmed(record) => Some(record),
            Verification::Unconfirmed(record) => record.as_ref(),
        }
    }
}

#[derive(Clone)]
pub struct VerificationPoller {
    remote: Remote,
    reader: ReviewReader,
    pacing: Pacing,
}

impl VerificationPoller {
    pub fn new(remote: Remote, pacing: Pacing) -> Self {
        Self {
            reader: ReviewReader::new(remote.clone()),
            remote,
            pacing,
        }
    }

    /// Settle, then re-read up to the configured number of times.
    pub async fn verify(&self, paper_id: u64, reviewer_email: &str) -> Result<Verification, SyncError> {
        self.remote.pause(self.pacing.verify_settle()).await;

        let policy = self.pacing.verify;
        let attempts = policy.attempts();
        let mut last = None;
        for attempt in 1..=attempts {
            if let Some(record) = self.reader.fetch(paper_id, reviewer_email).await? {
                if record.has_persisted_content() {
                    info!(paper_id, reviewer = reviewer_email, status = %record.status, attempt, "submission verified");
                    return Ok(Verification::Confirmed(record));
                }
                debug!(paper_id, reviewer = reviewer_email, status = %record.status, attempt, "no persisted content yet");
                last = Some(record);
            }
            if attempt < attempts {
                self.remote.pause(policy.interval()).await;
            }
        }

        warn!(paper_id, reviewer = reviewer_email, attempts, "could not verify submission");
        Ok(Verification::Unconfirmed(last))
    }
}
