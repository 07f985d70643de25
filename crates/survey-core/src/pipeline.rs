//! Submission pipeline
//!
//! Raw payload -> anonymize -> resolve identity -> validate -> append.
//! Each step short-circuits on failure; nothing is stored unless every
//! earlier step succeeded.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::anonymize::anonymize;
use crate::error::PipelineError;
use crate::identity::resolve;
use crate::models::StoredSurveyRecord;
use crate::schema::validate;
use crate::storage::RecordStore;

/// Acknowledgment of an accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub submission_id: String,
}

/// Stateless submission handler sharing one append target
#[derive(Clone)]
pub struct SubmissionPipeline {
    store: Arc<dyn RecordStore>,
}

impl SubmissionPipeline {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Process one submission received at `now` from `client_addr`.
    pub async fn handle(
        &self,
        raw: Value,
        now: DateTime<Utc>,
        client_addr: Option<&str>,
    ) -> Result<Accepted, PipelineError> {
        let Value::Object(payload) = raw else {
            return Err(PipelineError::MalformedInput);
        };

        let anonymized = anonymize(payload);
        for anomaly in &anonymized.anomalies {
            debug!(field = anomaly.field, "Field left unanonymized for validation");
        }

        let payload = resolve(anonymized.payload, &anonymized.identity, now);
        drop(anonymized.identity);

        let submission = validate(&payload).map_err(|errors| {
            info!("Rejected submission: {}", errors);
            PipelineError::ValidationFailed(errors)
        })?;

        let submission_id = submission.submission_id().to_string();
        let record = StoredSurveyRecord::new(submission, now, client_addr.unwrap_or_default());

        self.store.append(&record).await.map_err(|err| {
            warn!("Failed to store submission {}: {}", submission_id, err);
            PipelineError::StorageFailed(err)
        })?;

        info!("Accepted submission {}", submission_id);
        Ok(Accepted { submission_id })
    }
}
