//! PII stripping for incoming survey payloads
//!
//! Identity-bearing fields are replaced by their digest under a `_hash`
//! suffixed name. The raw email survives only as [`IdentityMaterial`],
//! which is handed to the identity resolver and then dropped.

use serde_json::Value;
use std::fmt;

use crate::hash::digest;
use crate::models::Payload;

/// Email field stripped from incoming payloads
pub const EMAIL_FIELD: &str = "email";

/// Age field stripped from incoming payloads
pub const AGE_FIELD: &str = "age";

/// Suffix appended to an anonymized field's name
pub const HASH_SUFFIX: &str = "_hash";

/// Raw identity value kept in-process for submission id derivation.
///
/// Not serializable, and its `Debug` output is redacted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct IdentityMaterial(String);

impl IdentityMaterial {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("IdentityMaterial(<empty>)")
        } else {
            f.write_str("IdentityMaterial(<redacted>)")
        }
    }
}

/// A field that could not be turned into canonical text.
///
/// Non-fatal: the field stays in the payload for the validator to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnonymizationAnomaly {
    pub field: &'static str,
}

/// Result of anonymizing one payload
#[derive(Debug)]
pub struct Anonymized {
    pub payload: Payload,
    pub identity: IdentityMaterial,
    pub anomalies: Vec<AnonymizationAnomaly>,
}

/// Canonical text of a scalar JSON value. Objects and arrays have none.
pub fn canonical_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        // Booleans render capitalized: `True` / `False`
        Value::Bool(true) => Some("True".to_string()),
        Value::Bool(false) => Some("False".to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Strip `email` and `age` from the payload, replacing each with its digest.
pub fn anonymize(mut payload: Payload) -> Anonymized {
    let mut identity = IdentityMaterial::default();
    let mut anomalies = Vec::new();

    match field_text(&payload, EMAIL_FIELD) {
        Some(Ok(text)) if !text.is_empty() => {
            replace_with_digest(&mut payload, EMAIL_FIELD, &text);
            identity = IdentityMaterial(text);
        }
        Some(Ok(_)) | None => {}
        Some(Err(anomaly)) => anomalies.push(anomaly),
    }

    match field_text(&payload, AGE_FIELD) {
        Some(Ok(text)) => replace_with_digest(&mut payload, AGE_FIELD, &text),
        None => {}
        Some(Err(anomaly)) => anomalies.push(anomaly),
    }

    Anonymized {
        payload,
        identity,
        anomalies,
    }
}

/// `None` when the field is absent or null.
fn field_text(
    payload: &Payload,
    field: &'static str,
) -> Option<Result<String, AnonymizationAnomaly>> {
    match payload.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(canonical_text(value).ok_or(AnonymizationAnomaly { field })),
    }
}

fn replace_with_digest(payload: &mut Payload, field: &str, text: &str) {
    payload.remove(field);
    payload.insert(
        format!("{field}{HASH_SUFFIX}"),
        Value::String(digest(text)),
    );
}
