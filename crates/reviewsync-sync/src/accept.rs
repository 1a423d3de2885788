//! Acceptance Confirmer: moves a freshly assigned review out of `Empty`.

use reviewsync_core::{Inspection, Outcome, ReviewRecord};
use tracing::{debug, info, warn};

use crate::SyncError;
use crate::config::Pacing;
use crate::reader::ReviewReader;
use crate::remote::Remote;
use crate::transport::{ApiRequest, endpoint};

#[derive(Clone)]
pub struct AcceptanceConfirmer {
    remote: Remote,
    reader: ReviewReader,
    pacing: Pacing,
}

impl AcceptanceConfirmer {
    pub fn new(remote: Remote, pacing: Pacing) -> Self {
        let reader = ReviewReader::new(remote.clone());
        Self {
            remote,
            reader,
            pacing,
        }
    }

    /// Read the record (retrying while it propagates), then accept it unless
    /// it is already past `Empty`.
    pub async fn ensure_accepted(&self, paper_id: u64, reviewer_email: &str) -> Result<Outcome, SyncError> {
        let Some(record) = self
            .reader
            .fetch_with_retry(paper_id, reviewer_email, self.pacing.accept_lookup)
            .await?
        else {
            warn!(paper_id, reviewer = reviewer_email, "cannot accept: review record not resolvable");
            return Ok(Outcome::hard("review record not resolvable"));
        };

        if !record.status.needs_acceptance() {
            debug!(paper_id, reviewer = reviewer_email, status = %record.status, "already accepted");
            return Ok(Outcome::success());
        }

        let outcome = self.accept(&record).await?;
        if outcome.is_tentative_success() {
            return Ok(outcome);
        }

        warn!(paper_id, reviewer = reviewer_email, %outcome, "accept rejected, retrying once");
        self.remote.pause(self.pacing.accept_retry_delay()).await;
        self.accept(&record).await
    }

    /// One read, one accept if still `Empty`. Used right before a submit,
    /// where a missing record is left for the submitter's own lookup to report.
    pub async fn confirm_once(&self, paper_id: u64, reviewer_email: &str) -> Result<Option<Outcome>, SyncError> {
        let Some(record) = self.reader.fetch(paper_id, reviewer_email).await? else {
            return Ok(None);
        };
        if !record.status.needs_acceptance() || record.review_id.is_none() {
            return Ok(None);
        }
        let outcome = self.accept(&record).await?;
        self.remote.pause(self.pacing.post_accept_settle()).await;
        Ok(Some(outcome))
    }

    async fn accept(&self, record: &ReviewRecord) -> Result<Outcome, SyncError> {
        let Some(review_id) = record.review_id.as_deref() else {
            return Ok(Outcome::hard("review record not resolvable"));
        };
        let request = ApiRequest::post(endpoint::accept(record.paper_id, review_id));
        let outcome = self.remote.call(&request, Inspection::StatusOnly).await?;
        info!(paper_id = record.paper_id, review_id, %outcome, "accept posted");
        Ok(outcome)
    }
}
