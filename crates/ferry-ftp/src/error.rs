//! Error types for the FTP adapter.

use thiserror::Error;

/// Errors raised by the FTP adapter.
#[derive(Debug, Error)]
pub enum FtpError {
    /// The endpoint address could not be resolved.
    #[error("endpoint address could not be resolved")]
    Resolve {
        /// `host:port` that failed to resolve.
        address: String,
        /// Underlying resolver error, absent when resolution returned nothing.
        #[source]
        source: Option<std::io::Error>,
    },
    /// The endpoint rejected or failed a protocol step.
    #[error("ftp protocol step failed")]
    Protocol {
        /// Step that failed.
        operation: &'static str,
        /// Underlying protocol error.
        source: suppaftp::FtpError,
    },
    /// The blocking task driving the connection died.
    #[error("ftp worker task failed")]
    Task {
        /// Step the task was running.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
    /// The control connection was already handed off or closed.
    #[error("ftp session already closed")]
    Closed,
}

impl FtpError {
    pub(crate) const fn protocol(operation: &'static str, source: suppaftp::FtpError) -> Self {
        Self::Protocol { operation, source }
    }

    pub(crate) const fn task(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Task { operation, source }
    }
}

/// Convenience alias for adapter results.
pub type FtpResult<T> = Result<T, FtpError>;
