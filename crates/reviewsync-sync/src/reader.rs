//! Review Record Reader: the current state of one `(paper, reviewer)` review.
//!
//! The backend is read-after-write inconsistent right after an assignment or
//! a submit, so callers should expect `None` and retry through
//! [`ReviewReader::fetch_with_retry`].

use reviewsync_core::ReviewRecord;
use reviewsync_core::classify::is_truthy;
use serde_json::Value;
use tracing::{debug, info};

use crate::SyncError;
use crate::config::RetryPolicy;
use crate::remote::Remote;
use crate::transport::{ApiRequest, endpoint};

#[derive(Clone)]
pub struct ReviewReader {
    remote: Remote,
}

impl ReviewReader {
    pub fn new(remote: Remote) -> Self {
        Self { remote }
    }

    /// Targeted query first; if it yields no record with a review identifier,
    /// scan the full listing for a case-insensitive email match.
    pub async fn fetch(&self, paper_id: u64, reviewer_email: &str) -> Result<Option<ReviewRecord>, SyncError> {
        let targeted = self.list(paper_id, Some(reviewer_email)).await?;
        let resolvable = targeted.into_iter().filter(|r| r.review_id.is_some());
        if let Some(record) = pick(resolvable, reviewer_email) {
            return Ok(Some(record));
        }

        debug!(paper_id, reviewer = reviewer_email, "targeted lookup empty, scanning all reviews");
        let all = self.list(paper_id, None).await?;
        Ok(all.into_iter().find(|r| r.matches_email(reviewer_email)))
    }

    /// Re-read until a record with a review identifier appears or the budget
    /// runs out. Transport errors end the loop immediately.
    pub async fn fetch_with_retry(
        &self,
        paper_id: u64,
        reviewer_email: &str,
        policy: RetryPolicy,
    ) -> Result<Option<ReviewRecord>, SyncError> {
        let attempts = policy.attempts();
        for attempt in 1..=attempts {
            if let Some(record) = self.fetch(paper_id, reviewer_email).await?
                && record.review_id.is_some()
            {
                return Ok(Some(record));
            }
            if attempt < attempts {
                debug!(paper_id, reviewer = reviewer_email, attempt, "review not resolvable yet");
                self.remote.pause(policy.interval()).await;
            }
        }
        info!(paper_id, reviewer = reviewer_email, attempts, "review not resolvable");
        Ok(None)
    }

    async fn list(&self, paper_id: u64, reviewer_email: Option<&str>) -> Result<Vec<ReviewRecord>, SyncError> {
        let request = ApiRequest::get(endpoint::reviews(paper_id, reviewer_email));
        let response = self.remote.send(&request).await?;
        if !response.is_success_status() {
            debug!(paper_id, status = response.status, "review listing not available");
            return Ok(Vec::new());
        }
        let Some(reply) = response.json() else {
            debug!(paper_id, "review listing was not JSON");
            return Ok(Vec::new());
        };
        if !reply.get("ok").is_some_and(is_truthy) {
            return Ok(Vec::new());
        }
        Ok(reply
            .get("reviews")
            .and_then(Value::as_array)
            .map(|reviews| {
                reviews
                    .iter()
                    .filter_map(|r| ReviewRecord::decode(paper_id, r, self.remote.content_fields()))
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Prefer the record whose email matches. A server-side filtered reply may
/// omit the email, so fall back to the first record without one; records
/// naming another reviewer are never picked.
fn pick(records: impl Iterator<Item = ReviewRecord>, reviewer_email: &str) -> Option<ReviewRecord> {
    let mut anonymous = None;
    for record in records {
        if record.matches_email(reviewer_email) {
            return Some(record);
        }
        if record.reviewer_email.trim().is_empty() {
            anonymous.get_or_insert(record);
        }
    }
    anonymous
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pace::RecordingSleeper;
    use crate::testing::{FakeBackend, html_reply, json_reply, remote};
    use crate::transport::{Method, Transport};
    use async_trait::async_trait;
    use reviewsync_core::{RawResponse, Status};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn targeted_lookup_finds_review() {
        let backend = FakeBackend::new();
        let rid = backend.seed(316, "r@x.edu", 1, 2);
        let (remote, _) = remote(&backend);

        let record = ReviewReader::new(remote)
            .fetch(316, "R@X.edu")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.review_id, Some(rid.to_string()));
        assert_eq!(record.status, Status::Acknowledged);
        assert_eq!(record.edit_version, Some(2));
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(backend.requests()[0].path, "/api/review?p=316&u=R%40X.edu");
    }

    #[tokio::test]
    async fn falls_back_to_full_listing() {
        let backend = FakeBackend::new();
        backend.seed(316, "other@x.edu", 2, 1);
        let rid = backend.seed(316, "R@x.EDU", 0, 0);
        backend.configure(|s| s.targeted_lookup_empty = true);
        let (remote, _) = remote(&backend);

        let record = ReviewReader::new(remote)
            .fetch(316, "r@x.edu")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.review_id, Some(rid.to_string()));
        let paths: Vec<_> = backend.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, vec!["/api/review?p=316&u=r%40x.edu", "/api/review?p=316"]);
    }

    #[tokio::test]
    async fn missing_review_is_none() {
        let backend = FakeBackend::new();
        backend.seed(316, "someone@x.edu", 1, 0);
        let (remote, _) = remote(&backend);

        let record = ReviewReader::new(remote).fetch(316, "r@x.edu").await.unwrap();
        assert!(record.is_none());
    }

    #[tokio::test]
    async fn lagging_review_appears_after_retries() {
        let backend = FakeBackend::new();
        let rid = backend.seed(316, "r@x.edu", 0, 0);
        backend.configure(|s| s.reviews[0].hidden_reads = 3);
        let (remote, sleeper) = remote(&backend);

        let record = ReviewReader::new(remote)
            .fetch_with_retry(316, "r@x.edu", RetryPolicy::new(5, 500))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.review_id, Some(rid.to_string()));
        // Each attempt costs a targeted read plus a listing read while hidden.
        assert_eq!(sleeper.slept(), vec![Duration::from_millis(500)]);
    }

    #[tokio::test]
    async fn retry_budget_is_bounded() {
        let backend = FakeBackend::new();
        let (remote, sleeper) = remote(&backend);

        let record = ReviewReader::new(remote)
            .fetch_with_retry(316, "r@x.edu", RetryPolicy::new(3, 500))
            .await
            .unwrap();
        assert!(record.is_none());
        assert_eq!(sleeper.slept().len(), 2);
        let gets = backend
            .requests()
            .into_iter()
            .filter(|r| r.method == Method::Get)
            .count();
        assert_eq!(gets, 6);
    }

    struct Canned(RawResponse);

    #[async_trait]
    impl Transport for Canned {
        async fn send(&self, _request: &ApiRequest) -> Result<RawResponse, SyncError> {
            Ok(self.0.clone())
        }
    }

    async fn fetch_from(reply: RawResponse) -> Option<ReviewRecord> {
        let remote = Remote::new(Arc::new(Canned(reply)), Arc::new(RecordingSleeper::new())).unwrap();
        ReviewReader::new(remote).fetch(316, "r@x.edu").await.unwrap()
    }

    #[tokio::test]
    async fn unusable_listings_read_as_no_record() {
        assert!(fetch_from(html_reply(500, "<html>Internal error</html>")).await.is_none());
        assert!(fetch_from(html_reply(200, "<html>Sign in</html>")).await.is_none());
        let refused = json_reply(json!({
            "ok": false,
            "reviews": [{"rid": 1, "reviewer_email": "r@x.edu"}]
        }));
        assert!(fetch_from(refused).await.is_none());
    }

    #[tokio::test]
    async fn another_reviewers_record_is_never_picked() {
        let reply = json_reply(json!({
            "ok": true,
            "reviews": [{"rid": 901, "reviewer_email": "other@x.edu", "reviewStatus": 1}]
        }));
        assert!(fetch_from(reply).await.is_none());
    }

    #[tokio::test]
    async fn filtered_reply_without_email_is_picked() {
        let reply = json_reply(json!({
            "ok": true,
            "reviews": [
                {"rid": 901, "reviewer_email": "other@x.edu", "reviewStatus": 1},
                {"rid": 902, "reviewStatus": 1}
            ]
        }));
        let record = fetch_from(reply).await.unwrap();
        assert_eq!(record.review_id.as_deref(), Some("902"));
    }

    #[tokio::test]
    async fn unknown_paper_reads_as_no_record() {
        let backend = FakeBackend::new();
        backend.seed(316, "r@x.edu", 1, 0);
        let (remote, _) = remote(&backend);
        assert!(ReviewReader::new(remote).fetch(999, "r@x.edu").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let backend = FakeBackend::new();
        backend.configure(|s| s.unreachable_prefix = Some("/api/review".into()));
        let (remote, _) = remote(&backend);

        let result = ReviewReader::new(remote).fetch(316, "r@x.edu").await;
        assert!(matches!(result, Err(SyncError::Transport(_))));
    }
}
