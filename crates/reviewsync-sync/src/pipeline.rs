//! Per-record orchestration: assign, accept, submit, verify.
//!
//! Records are processed strictly one after another. A [`SyncError`] ends
//! the current record only; the batch carries on with the next one.

use std::fmt;
use std::sync::Arc;

use reviewsync_core::{ImportRecord, Outcome, Status};
use tracing::{error, info, warn};

use crate::SyncError;
use crate::accept::AcceptanceConfirmer;
use crate::assign::AssignmentManager;
use crate::config::{Pacing, SyncConfig};
use crate::pace::Sleeper;
use crate::remote::Remote;
use crate::submit::ReviewSubmitter;
use crate::transport::Transport;
use crate::verify::{Verification, VerificationPoller};

/// Why a record did not make it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Network-level failure talking to the backend.
    Transport(String),
    Hard(String),
    Soft(String),
    /// Every call looked fine but the re-read never showed the content.
    Unverified(String),
}

impl FailureKind {
    fn from_outcome(outcome: &Outcome) -> Option<Self> {
        match outcome {
            Outcome::SoftFailure { message, .. } => Some(FailureKind::Soft(message.clone())),
            Outcome::HardFailure { message } => Some(FailureKind::Hard(message.clone())),
            Outcome::Success { .. } | Outcome::PendingVerification => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FailureKind::Transport(m)
            | FailureKind::Hard(m)
            | FailureKind::Soft(m)
            | FailureKind::Unverified(m) => m,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::Transport(_) => "transport error",
            FailureKind::Hard(_) => "failed",
            FailureKind::Soft(_) => "rejected",
            FailureKind::Unverified(_) => "unverified",
        };
        write!(f, "{label}: {}", self.message())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalOutcome {
    Success,
    Failure(FailureKind),
}

impl FinalOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FinalOutcome::Success)
    }
}

/// What happened to one input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordReport {
    pub paper_id: u64,
    pub reviewer_email: String,
    pub assignment: Option<Outcome>,
    pub acceptance: Option<Outcome>,
    pub submission: Option<Outcome>,
    /// Status seen by the last verification read.
    pub verified_status: Option<Status>,
    pub outcome: FinalOutcome,
}

impl RecordReport {
    fn new(record: &ImportRecord) -> Self {
        Self {
            paper_id: record.paper_id,
            reviewer_email: record.reviewer_email.clone(),
            assignment: None,
            acceptance: None,
            submission: None,
            verified_status: None,
            outcome: FinalOutcome::Success,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub reports: Vec<RecordReport>,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.reports.len()
    }

    pub fn succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.processed() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordReport> {
        self.reports.iter().filter(|r| !r.outcome.is_success())
    }
}

/// Drives each record through the four stages.
pub struct ReviewImporter {
    remote: Remote,
    pacing: Pacing,
    assignments: AssignmentManager,
    acceptance: AcceptanceConfirmer,
    submitter: ReviewSubmitter,
    verifier: VerificationPoller,
}

impl ReviewImporter {
    pub fn new(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Result<Self, SyncError> {
        let remote = Remote::new(transport, sleeper)?.with_content_fields(config.content_fields.clone());
        Ok(Self::with_remote(remote, config))
    }

    pub fn with_remote(remote: Remote, config: &SyncConfig) -> Self {
        let pacing = config.pacing.clone();
        Self {
            assignments: AssignmentManager::new(remote.clone()),
            acceptance: AcceptanceConfirmer::new(remote.clone(), pacing.clone()),
            submitter: ReviewSubmitter::new(remote.clone(), pacing.clone())
                .with_debug_html_dir(config.debug_html_dir.clone()),
            verifier: VerificationPoller::new(remote.clone(), pacing.clone()),
            remote,
            pacing,
        }
    }

    pub async fn run(&self, records: &[ImportRecord]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for (index, record) in records.iter().enumerate() {
            info!(
                record = index + 1,
                total = records.len(),
                paper_id = record.paper_id,
                reviewer = %record.reviewer_email,
                "processing record"
            );
            summary.reports.push(self.process(record).await);
        }
        info!(
            succeeded = summary.succeeded(),
            processed = summary.processed(),
            "import finished"
        );
        summary
    }

    /// Process one record. Never fails: errors land in the report.
    pub async fn process(&self, record: &ImportRecord) -> RecordReport {
        let mut report = RecordReport::new(record);
        report.outcome = match self.stages(record, &mut report).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(paper_id = record.paper_id, reviewer = %record.reviewer_email, error = %err, "transport failure");
                FinalOutcome::Failure(FailureKind::Transport(err.to_string()))
            }
        };
        match &report.outcome {
            FinalOutcome::Success => {
                info!(paper_id = record.paper_id, reviewer = %record.reviewer_email, "review imported")
            }
            FinalOutcome::Failure(failure) => {
                warn!(paper_id = record.paper_id, reviewer = %record.reviewer_email, %failure, "review not imported")
            }
        }
        report
    }

    /// Run the stages, filling in `report` as each one completes.
    async fn stages(&self, record: &ImportRecord, report: &mut RecordReport) -> Result<FinalOutcome, SyncError> {
        let paper_id = record.paper_id;
        let email = record.reviewer_email.as_str();

        let assignment = self.assignments.ensure_assigned(&record.assignment()).await?;
        let failed = FailureKind::from_outcome(&assignment);
        report.assignment = Some(assignment);
        if let Some(failure) = failed {
            return Ok(FinalOutcome::Failure(failure));
        }
        self.remote.pause(self.pacing.post_assign_settle()).await;

        let acceptance = self.acceptance.ensure_accepted(paper_id, email).await?;
        if acceptance.is_failure() {
            warn!(paper_id, reviewer = email, outcome = %acceptance, "acceptance not confirmed, submitting anyway");
        }
        report.acceptance = Some(acceptance);

        let submission = self
            .submitter
            .submit(paper_id, email, &record.fields, record.round())
            .await?;
        let failed = FailureKind::from_outcome(&submission);
        report.submission = Some(submission);
        if let Some(failure) = failed {
            return Ok(FinalOutcome::Failure(failure));
        }

        let verification = self.verifier.verify(paper_id, email).await?;
        report.verified_status = verification.record().map(|r| r.status);
        Ok(match verification {
            Verification::Confirmed(_) => FinalOutcome::Success,
            Verification::Unconfirmed(_) => FinalOutcome::Failure(FailureKind::Unverified(format!(
                "could not verify review for paper {paper_id} by {email}"
            ))),
        })
    }
}
