//! # Design
//!
//! - Provide structured, constant-message errors for the delivery pipeline.
//! - Capture stage context (bucket, key, host, path) so a failure can be diagnosed from one log line.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::model::RecordFailure;

/// Boxed error returned by port implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced by the delivery pipeline and query job.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The identity service refused the delegated role.
    #[error("role assumption failed")]
    Authentication {
        /// Role that could not be assumed.
        role: String,
        /// Underlying provider error.
        source: BoxError,
    },
    /// The source object could not be retrieved or read.
    #[error("object fetch failed")]
    Fetch {
        /// Source bucket.
        bucket: String,
        /// Source key.
        key: String,
        /// Underlying storage error.
        source: BoxError,
    },
    /// Writing the local archive failed.
    #[error("archive write failed")]
    ArchiveWrite {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Scratch path involved.
        path: PathBuf,
        /// Underlying IO or zip error.
        source: BoxError,
    },
    /// The transfer endpoint could not be reached or refused the login.
    #[error("transfer endpoint connection failed")]
    Connection {
        /// Endpoint address.
        host: String,
        /// Underlying transport error.
        source: BoxError,
    },
    /// The transfer endpoint rejected or dropped the upload.
    #[error("transfer write failed")]
    Write {
        /// File name at the endpoint.
        destination: String,
        /// Underlying transport error.
        source: BoxError,
    },
    /// The mirror bucket rejected the upload.
    #[error("mirror upload failed")]
    Upload {
        /// Mirror bucket.
        bucket: String,
        /// Mirror key.
        key: String,
        /// Underlying storage error.
        source: BoxError,
    },
    /// A record pipeline exceeded its time budget.
    #[error("record pipeline timed out")]
    Timeout {
        /// Source bucket.
        bucket: String,
        /// Source key.
        key: String,
        /// Budget that was exceeded.
        after: Duration,
    },
    /// A transfer session was driven out of order.
    #[error("invalid transfer session state")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the session was in.
        state: &'static str,
    },
    /// Event or record input failed validation.
    #[error("invalid pipeline input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A blocking task panicked or was cancelled.
    #[error("pipeline task failed")]
    Task {
        /// Operation the task was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// The query service refused the query.
    #[error("query submission failed")]
    Query {
        /// Database the query targeted.
        database: String,
        /// Underlying service error.
        source: BoxError,
    },
    /// At least one record failed under the all-or-nothing policy.
    #[error("one or more records failed")]
    Aggregate {
        /// Records processed by the invocation.
        total: usize,
        /// Every failed record, in event order.
        failures: Vec<RecordFailure>,
    },
}

impl PipelineError {
    pub(crate) fn archive_io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: io::Error,
    ) -> Self {
        Self::ArchiveWrite {
            operation,
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn archive_zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::ArchiveWrite {
            operation,
            path: path.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn invalid_input(field: &'static str, reason: &'static str, value: &str) -> Self {
        Self::InvalidInput {
            field,
            reason,
            value: Some(value.to_string()),
        }
    }

    /// Whether the error aborts the whole invocation rather than one record.
    #[must_use]
    pub const fn is_invocation_fatal(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::InvalidInput { .. } | Self::Aggregate { .. }
        )
    }
}

/// Recoverable archive issue; logged and returned, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveWarning {
    /// A scratch file left by an earlier run could not be removed first.
    #[error("stale scratch file could not be removed")]
    StaleScratch {
        /// Scratch path.
        path: PathBuf,
        /// Rendered IO error.
        detail: String,
    },
    /// The bytes read differ from the length the store declared.
    #[error("payload length differs from declared content length")]
    LengthMismatch {
        /// Length reported by the object store.
        declared: u64,
        /// Bytes actually archived.
        observed: u64,
    },
}
