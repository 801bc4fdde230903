//! Error types for the AWS adapters.
//!
//! # Design
//! - Messages stay constant; the service and operation travel as fields.
//! - SDK errors are kept as sources so their service detail survives in rendered chains.

use std::path::PathBuf;

use ferry_pipeline::BoxError;
use thiserror::Error;

/// Errors raised by the AWS adapters.
#[derive(Debug, Error)]
pub enum AwsError {
    /// An SDK call failed.
    #[error("aws request failed")]
    Request {
        /// Service the request targeted.
        service: &'static str,
        /// Operation that failed.
        operation: &'static str,
        /// Underlying SDK error.
        source: BoxError,
    },
    /// A successful response lacked a field the adapter needs.
    #[error("aws response missing field")]
    MissingField {
        /// Operation whose response was incomplete.
        operation: &'static str,
        /// Field that was absent.
        field: &'static str,
    },
    /// A local file could not be opened as a request body.
    #[error("request body could not be read")]
    Body {
        /// Local file.
        path: PathBuf,
        /// Underlying stream error.
        source: BoxError,
    },
}

impl AwsError {
    pub(crate) fn request<E>(service: &'static str, operation: &'static str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Request {
            service,
            operation,
            source: Box::new(source),
        }
    }
}

/// Convenience alias for adapter results.
pub type AwsResult<T> = Result<T, AwsError>;
