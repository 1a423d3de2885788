//! Core types for remote review submission: lifecycle model, outcome currency,
//! and classification of the backend's loosely-typed responses.

pub mod classify;
pub mod model;
pub mod outcome;

pub use classify::{Classifier, ClassifyError, Inspection, RawResponse};
pub use model::{AssignmentRequest, ContentFields, FieldSet, FieldValue, ImportRecord, ReviewRecord, Status};
pub use outcome::{BackendMessage, Outcome, OutcomeKind};
