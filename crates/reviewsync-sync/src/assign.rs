//! Assignment Manager.

use reviewsync_core::{AssignmentRequest, Inspection, Outcome};
use serde::Serialize;
use tracing::{info, warn};

use crate::SyncError;
use crate::remote::Remote;
use crate::transport::{ApiRequest, endpoint};

/// Action that lets the backend provision accounts for reviewers outside the
/// program committee.
const EXTERNAL: &str = "external";

/// One entry of the `assignments` batch.
#[derive(Debug, Serialize)]
struct AssignmentEntry<'a> {
    paper: u64,
    action: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    round: Option<&'a str>,
}

#[derive(Clone)]
pub struct AssignmentManager {
    remote: Remote,
}

impl AssignmentManager {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// Post a single-entry batch and forward the classified outcome.
    ///
    /// Already-assigned pairs are left to the backend, which accepts the same
    /// batch again without complaint.
    pub async fn ensure_assigned(&self, request: &AssignmentRequest) -> Result<Outcome, SyncError> {
        let batch = [AssignmentEntry {
            paper: request.paper_id,
            action: EXTERNAL,
            email: &request.reviewer_email,
            name: request.reviewer_name.as_deref(),
            round: request.round.as_deref(),
        }];
        let form = vec![("assignments".to_string(), serde_json::to_string(&batch)?)];
        let api = ApiRequest::post_form(endpoint::assign(request.paper_id), form);

        let outcome = self.remote.call(&api, Inspection::StatusOnly).await?;
        if outcome.is_failure() {
            warn!(
                paper_id = request.paper_id,
                reviewer = %request.reviewer_email,
                %outcome,
                "assignment failed"
            );
        } else {
            info!(paper_id = request.paper_id, reviewer = %request.reviewer_email, "assigned");
        }
        Ok(outcome)
    }
}
