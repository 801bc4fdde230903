#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging, span context, and Prometheus metrics shared by every Ferry binary.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::{ProcessContextGuard, invocation_span, record_span};
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, ENV_LOG_FORMAT, LogFormat, LoggingConfig, build_sha, init_logging,
};
pub use metrics::{Metrics, MetricsSnapshot};
