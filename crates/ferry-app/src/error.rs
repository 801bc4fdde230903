//! # Design
//!
//! - Centralize application-level errors for bootstrap and the Lambda handlers.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ferry_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: ferry_telemetry::TelemetryError,
    },
    /// The delivery pipeline or query job failed.
    #[error("pipeline operation failed")]
    Pipeline {
        /// Operation identifier.
        operation: &'static str,
        /// Source pipeline error.
        source: ferry_pipeline::PipelineError,
    },
    /// The Lambda runtime loop failed.
    #[error("lambda runtime failed")]
    Runtime {
        /// Operation identifier.
        operation: &'static str,
        /// Source runtime error.
        source: lambda_runtime::Error,
    },
}

impl AppError {
    pub(crate) const fn config(operation: &'static str, source: ferry_config::ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: ferry_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn pipeline(
        operation: &'static str,
        source: ferry_pipeline::PipelineError,
    ) -> Self {
        Self::Pipeline { operation, source }
    }

    pub(crate) const fn runtime(operation: &'static str, source: lambda_runtime::Error) -> Self {
        Self::Runtime { operation, source }
    }
}
