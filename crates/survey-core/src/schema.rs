//! Survey submission schema and validator
//!
//! Declared fields are type-checked and constrained; anything not declared
//! is dropped from the typed record.

use serde_json::Value;
use tracing::debug;

use crate::error::{ValidationErrors, Violation, ViolationKind};
use crate::models::{Payload, SurveySubmission};

/// JSON type a declared field must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

/// Constraint checked after the type matches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    None,
    /// Character count; the minimum is measured on trimmed text
    Length { min: usize, max: usize },
    /// 64 lowercase hex characters
    HexDigest,
    /// Whole number within the inclusive range
    IntegerRange { min: i64, max: i64 },
}

/// Declaration of one schema field
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub constraint: Constraint,
}

const fn field(
    name: &'static str,
    ty: FieldType,
    required: bool,
    constraint: Constraint,
) -> FieldSpec {
    FieldSpec {
        name,
        ty,
        required,
        nullable: !required,
        constraint,
    }
}

pub const SUBMISSION_ID: FieldSpec = field(
    "submission_id",
    FieldType::String,
    true,
    Constraint::Length { min: 1, max: 128 },
);
pub const ANSWER: FieldSpec = field(
    "answer",
    FieldType::String,
    true,
    Constraint::Length { min: 1, max: 1000 },
);
pub const NAME: FieldSpec = field(
    "name",
    FieldType::String,
    false,
    Constraint::Length { min: 1, max: 100 },
);
pub const EMAIL_HASH: FieldSpec = field("email_hash", FieldType::String, false, Constraint::HexDigest);
pub const AGE_HASH: FieldSpec = field("age_hash", FieldType::String, false, Constraint::HexDigest);
pub const RATING: FieldSpec = field(
    "rating",
    FieldType::Number,
    false,
    Constraint::IntegerRange { min: 1, max: 5 },
);
pub const CONSENT: FieldSpec = field("consent", FieldType::Boolean, false, Constraint::None);
pub const COMMENTS: FieldSpec = field(
    "comments",
    FieldType::String,
    false,
    Constraint::Length { min: 0, max: 1000 },
);
pub const USER_AGENT: FieldSpec = field(
    "user_agent",
    FieldType::String,
    false,
    Constraint::Length { min: 0, max: 512 },
);

/// Every declared field, in declaration order
pub const SURVEY_SCHEMA: [FieldSpec; 9] = [
    SUBMISSION_ID,
    ANSWER,
    NAME,
    EMAIL_HASH,
    AGE_HASH,
    RATING,
    CONSENT,
    COMMENTS,
    USER_AGENT,
];

/// Validate an anonymized, id-resolved payload into a [`SurveySubmission`].
pub fn validate(payload: &Payload) -> Result<SurveySubmission, ValidationErrors> {
    let mut checker = Checker {
        payload,
        violations: Vec::new(),
    };

    let submission_id = checker.string(&SUBMISSION_ID);
    let answer = checker.string(&ANSWER);
    let name = checker.string(&NAME);
    let email_hash = checker.string(&EMAIL_HASH);
    let age_hash = checker.string(&AGE_HASH);
    let rating = checker.integer(&RATING);
    let consent = checker.boolean(&CONSENT);
    let comments = checker.string(&COMMENTS);
    let user_agent = checker.string(&USER_AGENT);

    if !checker.violations.is_empty() {
        return Err(ValidationErrors(checker.violations));
    }

    let dropped: Vec<&str> = payload
        .keys()
        .map(String::as_str)
        .filter(|key| !SURVEY_SCHEMA.iter().any(|spec| spec.name == *key))
        .collect();
    if !dropped.is_empty() {
        debug!(fields = ?dropped, "Dropping undeclared fields");
    }

    // Required fields are Some here: an absent one would have been reported.
    Ok(SurveySubmission {
        submission_id: submission_id.unwrap_or_default(),
        answer: answer.unwrap_or_default(),
        name,
        email_hash,
        age_hash,
        rating,
        consent,
        comments,
        user_agent,
    })
}

struct Checker<'a> {
    payload: &'a Payload,
    violations: Vec<Violation>,
}

impl<'a> Checker<'a> {
    /// Present, non-null value for `spec`, or `None` after recording any
    /// missing/null violation.
    fn present(&mut self, spec: &FieldSpec) -> Option<&'a Value> {
        let payload = self.payload;
        match payload.get(spec.name) {
            None if spec.required => {
                self.report(spec, ViolationKind::Missing, "Field required");
                None
            }
            Some(Value::Null) if !spec.nullable => {
                self.report(spec, ViolationKind::NullNotAllowed, "Field may not be null");
                None
            }
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn string(&mut self, spec: &FieldSpec) -> Option<String> {
        debug_assert_eq!(spec.ty, FieldType::String);
        let value = self.present(spec)?;

        let Some(text) = value.as_str() else {
            self.report(spec, ViolationKind::StringType, "Input should be a valid string");
            return None;
        };

        match spec.constraint {
            Constraint::Length { min, max } => {
                if text.trim().chars().count() < min {
                    self.report(
                        spec,
                        ViolationKind::StringTooShort,
                        format!("String should have at least {min} non-blank character(s)"),
                    );
                    return None;
                }
                if text.chars().count() > max {
                    self.report(
                        spec,
                        ViolationKind::StringTooLong,
                        format!("String should have at most {max} characters"),
                    );
                    return None;
                }
            }
            Constraint::HexDigest => {
                let is_digest = text.len() == 64
                    && text
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
                if !is_digest {
                    self.report(
                        spec,
                        ViolationKind::PatternMismatch,
                        "String should be 64 lowercase hex characters",
                    );
                    return None;
                }
            }
            Constraint::None | Constraint::IntegerRange { .. } => {}
        }

        Some(text.to_string())
    }

    fn integer(&mut self, spec: &FieldSpec) -> Option<i64> {
        debug_assert_eq!(spec.ty, FieldType::Number);
        let value = self.present(spec)?;

        let Value::Number(number) = value else {
            self.report(spec, ViolationKind::NumberType, "Input should be a valid number");
            return None;
        };
        let Some(n) = number.as_i64() else {
            self.report(spec, ViolationKind::IntType, "Input should be a valid integer");
            return None;
        };

        if let Constraint::IntegerRange { min, max } = spec.constraint {
            if n < min || n > max {
                self.report(
                    spec,
                    ViolationKind::OutOfRange,
                    format!("Input should be between {min} and {max}"),
                );
                return None;
            }
        }

        Some(n)
    }

    fn boolean(&mut self, spec: &FieldSpec) -> Option<bool> {
        debug_assert_eq!(spec.ty, FieldType::Boolean);
        let value = self.present(spec)?;

        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.report(spec, ViolationKind::BoolType, "Input should be a valid boolean");
                None
            }
        }
    }

    fn report(&mut self, spec: &FieldSpec, kind: ViolationKind, msg: impl Into<String>) {
        self.violations.push(Violation::new(spec.name, kind, msg));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;
    use serde_json::json;

    fn payload(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn kinds(err: &ValidationErrors) -> Vec<(String, ViolationKind)> {
        err.violations()
            .iter()
            .map(|v| (v.loc.join("."), v.kind))
            .collect()
    }

    #[test]
    fn test_minimal_valid_payload() {
        let submission = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes"
        })))
        .unwrap();

        assert_eq!(submission.submission_id(), "abc");
        assert_eq!(submission.answer(), "yes");
        assert_eq!(submission.rating(), None);
        assert_eq!(submission.email_hash(), None);
    }

    #[test]
    fn test_full_payload() {
        let submission = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes",
            "name": "Ada",
            "email_hash": digest("a@x.com"),
            "age_hash": digest("30"),
            "rating": 4,
            "consent": true,
            "comments": "",
            "user_agent": "curl/8.0"
        })))
        .unwrap();

        assert_eq!(submission.name(), Some("Ada"));
        assert_eq!(submission.rating(), Some(4));
        assert_eq!(submission.consent(), Some(true));
        assert_eq!(submission.comments(), Some(""));
        assert_eq!(submission.user_agent(), Some("curl/8.0"));
    }

    #[test]
    fn test_empty_payload_lists_missing_required_fields() {
        let err = validate(&Payload::new()).unwrap_err();

        assert_eq!(
            kinds(&err),
            vec![
                ("submission_id".to_string(), ViolationKind::Missing),
                ("answer".to_string(), ViolationKind::Missing),
            ]
        );
    }

    #[test]
    fn test_type_and_constraint_violations() {
        let err = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "   ",
            "name": 7,
            "email_hash": "not-a-digest",
            "rating": 9,
            "consent": "yes",
            "comments": "x".repeat(1001)
        })))
        .unwrap_err();

        assert_eq!(
            kinds(&err),
            vec![
                ("answer".to_string(), ViolationKind::StringTooShort),
                ("name".to_string(), ViolationKind::StringType),
                ("email_hash".to_string(), ViolationKind::PatternMismatch),
                ("rating".to_string(), ViolationKind::OutOfRange),
                ("consent".to_string(), ViolationKind::BoolType),
                ("comments".to_string(), ViolationKind::StringTooLong),
            ]
        );
    }

    #[test]
    fn test_fractional_rating_is_rejected() {
        let err = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes",
            "rating": 2.5
        })))
        .unwrap_err();

        assert_eq!(kinds(&err), vec![("rating".to_string(), ViolationKind::IntType)]);
    }

    #[test]
    fn test_null_handling() {
        let ok = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes",
            "name": null
        })))
        .unwrap();
        assert_eq!(ok.name(), None);

        let err = validate(&payload(json!({
            "submission_id": "abc",
            "answer": null
        })))
        .unwrap_err();
        assert_eq!(
            kinds(&err),
            vec![("answer".to_string(), ViolationKind::NullNotAllowed)]
        );
    }

    #[test]
    fn test_undeclared_fields_are_dropped() {
        let submission = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes",
            "age": { "years": 30 },
            "favourite_colour": "blue"
        })))
        .unwrap();

        let serialized = serde_json::to_value(&submission).unwrap();
        let object = serialized.as_object().unwrap();
        assert!(!object.contains_key("age"));
        assert!(!object.contains_key("favourite_colour"));
        assert_eq!(object.len(), SURVEY_SCHEMA.len());
    }

    #[test]
    fn test_violation_messages_do_not_echo_input() {
        let err = validate(&payload(json!({
            "submission_id": "abc",
            "answer": "yes",
            "email_hash": "a@x.com"
        })))
        .unwrap_err();

        let rendered = serde_json::to_string(&err).unwrap();
        assert!(!rendered.contains("a@x.com"));
        assert!(!err.to_string().contains("a@x.com"));
    }
}
