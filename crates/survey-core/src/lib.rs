//! Survey intake core
//!
//! Turns raw survey payloads into anonymized, validated records and appends
//! them to a durable log.
//!
//! ## Flow
//!
//! 1. [`anonymize`] replaces `email`/`age` with `email_hash`/`age_hash`
//! 2. [`identity::resolve`] fills in `submission_id` from email + hour bucket
//! 3. [`validate`] checks the payload against the survey schema
//! 4. [`RecordStore::append`] persists the record with receipt metadata

pub mod anonymize;
pub mod error;
pub mod hash;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod storage;

pub use anonymize::{anonymize, AnonymizationAnomaly, Anonymized, IdentityMaterial};
pub use error::{PipelineError, StorageError, ValidationErrors, Violation, ViolationKind};
pub use hash::digest;
pub use identity::{derive_submission_id, hour_bucket};
pub use models::{Payload, StoredSurveyRecord, SurveySubmission};
pub use pipeline::{Accepted, SubmissionPipeline};
pub use schema::validate;
pub use storage::{JsonLinesStore, MemoryStore, RecordStore};
