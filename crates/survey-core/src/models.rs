//! Data models for survey intake

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Open JSON object as received from (and transformed for) a client
pub type Payload = Map<String, Value>;

/// Schema-conformant survey submission.
///
/// Only the validator constructs one; it is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveySubmission {
    pub(crate) submission_id: String,
    pub(crate) answer: String,
    pub(crate) name: Option<String>,
    pub(crate) email_hash: Option<String>,
    pub(crate) age_hash: Option<String>,
    pub(crate) rating: Option<i64>,
    pub(crate) consent: Option<bool>,
    pub(crate) comments: Option<String>,
    pub(crate) user_agent: Option<String>,
}

impl SurveySubmission {
    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email_hash(&self) -> Option<&str> {
        self.email_hash.as_deref()
    }

    pub fn age_hash(&self) -> Option<&str> {
        self.age_hash.as_deref()
    }

    pub fn rating(&self) -> Option<i64> {
        self.rating
    }

    pub fn consent(&self) -> Option<bool> {
        self.consent
    }

    pub fn comments(&self) -> Option<&str> {
        self.comments.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

/// A submission plus receipt metadata, as appended to the log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredSurveyRecord {
    #[serde(flatten)]
    submission: SurveySubmission,

    /// When the submission was received (UTC)
    received_at: DateTime<Utc>,

    /// Best-effort client address, empty if unknown
    ip: String,
}

impl StoredSurveyRecord {
    pub fn new(submission: SurveySubmission, received_at: DateTime<Utc>, ip: impl Into<String>) -> Self {
        Self {
            submission,
            received_at,
            ip: ip.into(),
        }
    }

    pub fn submission(&self) -> &SurveySubmission {
        &self.submission
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }
}
