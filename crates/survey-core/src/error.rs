//! Error types for the submission pipeline and record storage

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of schema violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    NullNotAllowed,
    StringType,
    NumberType,
    BoolType,
    IntType,
    StringTooShort,
    StringTooLong,
    OutOfRange,
    PatternMismatch,
}

/// One schema violation. Never carries the offending input value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub loc: Vec<String>,
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub msg: String,
}

impl Violation {
    pub fn new(field: &str, kind: ViolationKind, msg: impl Into<String>) -> Self {
        Self {
            loc: vec![field.to_string()],
            kind,
            msg: msg.into(),
        }
    }
}

/// All violations found in one payload, in schema declaration order
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
#[error("{} validation error(s){}", .0.len(), summarize(.0))]
pub struct ValidationErrors(pub Vec<Violation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.0
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("; {}: {}", v.loc.join("."), v.msg))
        .collect()
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to append to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Submission body must be a JSON object")]
    MalformedInput,

    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Storage failed: {0}")]
    StorageFailed(#[from] StorageError),
}
