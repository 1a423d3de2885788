//! Review Submitter: one combined submit, with a draft-then-submit fallback
//! for when the backend accepts the payload but drops its content.

use std::path::{Path, PathBuf};

use reviewsync_core::{FieldSet, Inspection, Outcome, RawResponse, ReviewRecord};
use tracing::{debug, info, warn};

use crate::SyncError;
use crate::accept::AcceptanceConfirmer;
use crate::config::Pacing;
use crate::reader::ReviewReader;
use crate::remote::Remote;
use crate::transport::{ApiRequest, endpoint};

/// Form keys worth seeing in request logs.
const LOGGED_KEYS: &[&str] = &[
    "submitreview",
    "savedraft",
    "update",
    "reviewerEmail",
    "ready",
    "override",
    "r",
    "edit_version",
    "if_vtag_match",
];

const LOG_VALUE_CHARS: usize = 30;

/// Which action flag a submission form carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Submit,
    Draft,
}

impl Phase {
    fn flag(self) -> &'static str {
        match self {
            Phase::Submit => "submitreview",
            Phase::Draft => "savedraft",
        }
    }
}

/// Build the form for one write against `record`.
///
/// Carries the record's version tag as a precondition and the next edit
/// version, so a concurrent edit makes the backend reject the write.
pub fn submission_form(
    record: &ReviewRecord,
    reviewer_email: &str,
    fields: &FieldSet,
    round: Option<&str>,
    phase: Phase,
) -> Vec<(String, String)> {
    let review_id = record.review_id.clone().unwrap_or_default();
    let mut form: Vec<(String, String)> = vec![
        ("p".into(), record.paper_id.to_string()),
        ("r".into(), review_id),
        ("paperId".into(), record.paper_id.to_string()),
        ("reviewerEmail".into(), reviewer_email.to_string()),
        ("ready".into(), "1".into()),
        ("override".into(), "1".into()),
        ("update".into(), "1".into()),
        (phase.flag().into(), "1".into()),
    ];
    if let Some(tag) = &record.version_tag {
        form.push(("if_vtag_match".into(), tag.clone()));
    }
    form.push(("edit_version".into(), record.next_edit_version().to_string()));
    if let Some(round) = round {
        form.push(("round".into(), round.to_string()));
    }

    for (id, value) in fields.iter() {
        form.push((id.to_string(), value.to_form_value()));
    }
    for (id, value) in fields.iter() {
        if value.is_text() && is_text_slot(id) {
            form.push((format!("has_{id}"), "1".into()));
        }
    }
    form
}

/// `t` followed by digits, the backend's naming for free-text slots.
fn is_text_slot(id: &str) -> bool {
    id.strip_prefix('t')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn summarize(form: &[(String, String)]) -> String {
    form.iter()
        .filter(|(k, _)| LOGGED_KEYS.contains(&k.as_str()))
        .map(|(k, v)| {
            let shown: String = v.chars().take(LOG_VALUE_CHARS).collect();
            if shown.len() < v.len() {
                format!("{k}={shown}...")
            } else {
                format!("{k}={shown}")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Clone)]
pub struct ReviewSubmitter {
    remote: Remote,
    reader: ReviewReader,
    acceptance: AcceptanceConfirmer,
    pacing: Pacing,
    debug_html_dir: Option<PathBuf>,
}

impl ReviewSubmitter {
    pub fn new(remote: Remote, pacing: Pacing) -> Self {
        Self {
            reader: ReviewReader::new(remote.clone()),
            acceptance: AcceptanceConfirmer::new(remote.clone(), pacing.clone()),
            remote,
            pacing,
            debug_html_dir: None,
        }
    }

    /// Archive ambiguous HTML replies to `dir` for later inspection.
    pub fn with_debug_html_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_html_dir = dir;
        self
    }

    pub async fn submit(
        &self,
        paper_id: u64,
        reviewer_email: &str,
        fields: &FieldSet,
        round: Option<&str>,
    ) -> Result<Outcome, SyncError> {
        match self.acceptance.confirm_once(paper_id, reviewer_email).await? {
            Some(outcome) if outcome.is_failure() => {
                warn!(paper_id, reviewer = reviewer_email, %outcome, "pre-submit accept rejected")
            }
            Some(_) => debug!(paper_id, reviewer = reviewer_email, "accepted before submit"),
            None => {}
        }

        let Some(record) = self
            .reader
            .fetch_with_retry(paper_id, reviewer_email, self.pacing.submit_lookup)
            .await?
        else {
            warn!(paper_id, reviewer = reviewer_email, "cannot submit: review record not resolvable");
            return Ok(Outcome::hard("review record not resolvable"));
        };

        let form = submission_form(&record, reviewer_email, fields, round, Phase::Submit);
        let outcome = self.post(&record, form).await?;
        if !outcome.has_error_messages() {
            return Ok(outcome);
        }

        warn!(paper_id, reviewer = reviewer_email, %outcome, "submit accepted with errors, re-checking");
        self.remote.pause(self.pacing.warning_recheck_delay()).await;
        match self.reader.fetch(paper_id, reviewer_email).await? {
            Some(current) if !current.has_persisted_content() => {
                self.draft_then_submit(current, reviewer_email, fields, round).await
            }
            Some(_) => Ok(outcome),
            None => {
                debug!(paper_id, reviewer = reviewer_email, "re-check read nothing, keeping submit outcome");
                Ok(outcome)
            }
        }
    }

    async fn draft_then_submit(
        &self,
        record: ReviewRecord,
        reviewer_email: &str,
        fields: &FieldSet,
        round: Option<&str>,
    ) -> Result<Outcome, SyncError> {
        let paper_id = record.paper_id;
        warn!(paper_id, reviewer = reviewer_email, "content was not saved, falling back to draft then submit");

        let draft = submission_form(&record, reviewer_email, fields, round, Phase::Draft);
        let outcome = self.post(&record, draft).await?;
        if outcome.is_failure() {
            warn!(paper_id, reviewer = reviewer_email, %outcome, "draft save failed");
            return Ok(outcome);
        }

        self.remote.pause(self.pacing.draft_to_submit_delay()).await;
        let record = match self.reader.fetch(paper_id, reviewer_email).await {
            Ok(Some(fresh)) if fresh.review_id.is_some() => fresh,
            Ok(_) => record,
            Err(err) => {
                warn!(paper_id, error = %err, "token refresh failed, reusing previous tokens");
                record
            }
        };
        let form = submission_form(&record, reviewer_email, fields, round, Phase::Submit);
        self.post(&record, form).await
    }

    async fn post(&self, record: &ReviewRecord, form: Vec<(String, String)>) -> Result<Outcome, SyncError> {
        let review_id = record.review_id.as_deref().unwrap_or_default();
        debug!(
            paper_id = record.paper_id,
            params = form.len(),
            summary = %summarize(&form),
            "posting review"
        );
        let request = ApiRequest::post_form(endpoint::submit(record.paper_id, review_id), form);
        let response = self.remote.send(&request).await?;
        let outcome = self.remote.classify(&response, Inspection::Content);
        info!(paper_id = record.paper_id, review_id, status = response.status, %outcome, "review posted");

        if outcome == Outcome::PendingVerification
            && let Some(dir) = &self.debug_html_dir
        {
            archive_response(dir, record.paper_id, review_id, &response).await;
        }
        Ok(outcome)
    }
}

/// Write an ambiguous reply to `dir`. Failures are logged, never returned.
async fn archive_response(dir: &Path, paper_id: u64, review_id: &str, response: &RawResponse) {
    let review_id: String = review_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let name = format!(
        "review_response_p{paper_id}_r{review_id}_{}.html",
        chrono::Utc::now().timestamp()
    );
    let path = dir.join(name);
    let written = match tokio::fs::create_dir_all(dir).await {
        Ok(()) => tokio::fs::write(&path, &response.body).await,
        Err(err) => Err(err),
    };
    match written {
        Ok(()) => debug!(path = %path.display(), "archived ambiguous response"),
        Err(err) => warn!(path = %path.display(), error = %err, "could not archive response"),
    }
}
