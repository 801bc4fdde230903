//! Error types for telemetry operations.

use prometheus::Error as PrometheusError;
use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or maintaining the metrics registry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global tracing subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// A collector could not be built or registered.
    #[error("metrics collector setup failed")]
    Collector {
        /// Metric name tied to the failure.
        name: &'static str,
        /// Setup step, `build` or `register`.
        step: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Text exposition could not be produced.
    #[error("failed to render metrics")]
    Render {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoded exposition was not UTF-8.
    #[error("rendered metrics were not valid utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl TelemetryError {
    pub(crate) const fn collector(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            step: "build",
            source,
        }
    }

    pub(crate) const fn register(name: &'static str, source: PrometheusError) -> Self {
        Self::Collector {
            name,
            step: "register",
            source,
        }
    }
}
