//! Structured error types shared across SEM crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`SemError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (paths, identifiers, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for campaign operations.
///
/// Individual simulation failures are never reported through this type; they
/// are recorded as [`crate::RunStatus`] values inside the stored result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum SemError {
    /// Result store unreachable or query malformed.
    #[error("query error: {0}")]
    Query(ErrorInfo),
    /// A result with identical parameters and repetition already exists.
    #[error("duplicate key: {0}")]
    DuplicateKey(ErrorInfo),
    /// Requested execution mode is not supported.
    #[error("unknown runner configuration: {0}")]
    UnknownRunner(ErrorInfo),
    /// Store schema, open, insert, or counter failures.
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// Simulator introspection or process management failures outside a job.
    #[error("runner error: {0}")]
    Runner(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Invalid campaign configuration, parameter space, or array shape.
    #[error("config error: {0}")]
    Config(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl SemError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            SemError::Query(info)
            | SemError::DuplicateKey(info)
            | SemError::UnknownRunner(info)
            | SemError::Store(info)
            | SemError::Runner(info)
            | SemError::Serde(info)
            | SemError::Config(info) => info,
        }
    }

    /// Returns true when the error is a [`SemError::DuplicateKey`].
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, SemError::DuplicateKey(_))
    }
}

/// Shorthand for wrapping a `serde_json` failure under a given code.
pub fn serde_error(code: &str, err: impl ToString) -> SemError {
    SemError::Serde(ErrorInfo::new(code, err.to_string()))
}
