//! Review submission against the remote review backend.
//!
//! Each input record goes through assign, accept, submit and verify. Only a
//! verification re-read decides success; every earlier stage just reports an
//! [`Outcome`](reviewsync_core::Outcome). Waiting goes through [`Sleeper`]
//! and every network call through [`Transport`], so the whole pipeline runs
//! against an in-memory backend in tests.

pub mod accept;
pub mod assign;
pub mod config;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod pace;
pub mod pipeline;
pub mod reader;
pub mod remote;
pub mod submit;
pub mod transport;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use accept::AcceptanceConfirmer;
pub use assign::AssignmentManager;
pub use config::{Pacing, RetryPolicy, SyncConfig};
pub use error::SyncError;
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use pace::{RecordingSleeper, Sleeper, TokioSleeper};
pub use pipeline::{BatchSummary, FailureKind, FinalOutcome, RecordReport, ReviewImporter};
pub use reader::ReviewReader;
pub use remote::Remote;
pub use submit::{Phase, ReviewSubmitter, submission_form};
pub use transport::{ApiRequest, Method, RequestBody, Transport};
pub use verify::{Verification, VerificationPoller};
