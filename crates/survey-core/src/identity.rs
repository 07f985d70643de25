//! Submission identity derivation
//!
//! A submission id is the digest of the raw email plus the UTC hour bucket,
//! so a resubmission from the same address within the same hour maps to the
//! same id. Without an email every submission in the bucket shares one id.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::anonymize::IdentityMaterial;
use crate::hash::digest;
use crate::models::Payload;

/// Field carrying the submission identity
pub const SUBMISSION_ID_FIELD: &str = "submission_id";

/// Mixed into the bucket when no identity material is available
pub const ANONYMOUS_SENTINEL: &str = "NO_EMAIL";

/// `now` truncated to the hour, as `YYYYMMDDHH` in UTC.
pub fn hour_bucket(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H").to_string()
}

/// Derive the submission id for `identity` within the hour containing `now`.
pub fn derive_submission_id(identity: &IdentityMaterial, now: DateTime<Utc>) -> String {
    let bucket = hour_bucket(now);

    if identity.is_empty() {
        digest(&format!("{bucket}{ANONYMOUS_SENTINEL}"))
    } else {
        digest(&format!("{}{bucket}", identity.expose()))
    }
}

/// Ensure the payload carries a `submission_id`.
///
/// A caller-supplied id that is present and non-empty is kept untouched.
pub fn resolve(mut payload: Payload, identity: &IdentityMaterial, now: DateTime<Utc>) -> Payload {
    let supplied = payload
        .get(SUBMISSION_ID_FIELD)
        .is_some_and(|value| !is_empty_value(value));

    if supplied {
        debug!("Keeping caller-supplied submission_id");
        return payload;
    }

    if identity.is_empty() {
        debug!("No identity material, deriving anonymous bucket id");
    }

    let id = derive_submission_id(identity, now);
    payload.insert(SUBMISSION_ID_FIELD.to_string(), Value::String(id));
    payload
}

/// Null, `""`, `false`, zero, `[]` and `{}` count as no id at all; any
/// other non-string is left for the validator to reject.
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
