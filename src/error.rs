//! Error types for Jobflow.
//!
//! All errors in Jobflow are represented by the `JobflowError` enum.
//! Target- and pattern-scoped variants are normally recorded in a run
//! report rather than propagated; only orchestration decides when one of
//! them ends a job.

use std::{io::ErrorKind, string::FromUtf8Error};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for all Jobflow operations.
#[derive(Deserialize, Serialize, Error, Debug, Clone, PartialEq)]
pub enum JobflowError {
    /// Bad network range, unknown group or failed target lookup.
    #[error("target resolution: {0}")]
    TargetResolution(String),

    /// A command template references a placeholder with no parameter.
    #[error("template: {0}")]
    Template(String),

    /// Non-zero exit, timeout or transport failure from the runner.
    #[error("execution: {0}")]
    Execution(String),

    /// A result pattern's regex does not compile.
    #[error("pattern '{name}' failed to compile: {message}")]
    PatternCompile {
        name: String,
        message: String,
    },

    /// A result pattern found nothing in the output.
    #[error("pattern '{0}' did not match")]
    PatternNoMatch(String),

    /// The storage collaborator rejected a write.
    #[error("persistence: {0}")]
    Persistence(String),

    /// An update addressed a row that does not exist.
    #[error("record not found in '{table}' for key {key}")]
    RecordNotFound {
        table: String,
        key: String,
    },

    /// A job or action document is structurally invalid.
    #[error("validation: {0}")]
    Validation(String),

    /// Configuration parsing errors.
    #[error("{0}")]
    Config(String),

    /// Data conversion errors (JSON, TOML).
    #[error("{0}")]
    Convert(String),

    /// Work abandoned because the job was cancelled.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// I/O operation errors.
    #[error("{0}")]
    IoError(String),

    /// Event queue errors.
    #[error("{0}")]
    Queue(String),
}

impl From<JobflowError> for String {
    fn from(val: JobflowError) -> Self {
        val.to_string()
    }
}

impl From<std::io::Error> for JobflowError {
    fn from(error: std::io::Error) -> Self {
        JobflowError::IoError(error.to_string())
    }
}

impl From<JobflowError> for std::io::Error {
    fn from(val: JobflowError) -> Self {
        #[allow(clippy::io_other_error)]
        std::io::Error::new(ErrorKind::Other, val.to_string())
    }
}

impl From<FromUtf8Error> for JobflowError {
    fn from(_: FromUtf8Error) -> Self {
        JobflowError::Execution("command output is not valid utf-8".to_string())
    }
}

impl From<serde_json::Error> for JobflowError {
    fn from(error: serde_json::Error) -> Self {
        JobflowError::Convert(error.to_string())
    }
}

impl From<toml::de::Error> for JobflowError {
    fn from(error: toml::de::Error) -> Self {
        JobflowError::Config(error.to_string())
    }
}

impl From<jsonschema::ValidationError<'_>> for JobflowError {
    fn from(error: jsonschema::ValidationError<'_>) -> Self {
        JobflowError::Validation(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = JobflowError::RecordNotFound {
            table: "devices".to_string(),
            key: "ip_address=10.0.0.1".to_string(),
        };
        assert_eq!(err.to_string(), "record not found in 'devices' for key ip_address=10.0.0.1");

        let err = JobflowError::PatternCompile {
            name: "ping".to_string(),
            message: "unclosed group".to_string(),
        };
        assert!(err.to_string().contains("ping"));
    }

    #[test]
    fn test_from_json_error() {
        let err: JobflowError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, JobflowError::Convert(_)));
    }
}
