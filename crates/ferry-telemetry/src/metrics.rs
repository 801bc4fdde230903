//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters are labelled by stage and status so a failed delivery is visible
//!   separately from a failed mirror.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
    exponential_buckets,
};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

const STAGE_TOTAL: &str = "ferry_stage_total";
const RECORDS_TOTAL: &str = "ferry_records_total";
const INVOCATIONS_TOTAL: &str = "ferry_invocations_total";
const QUERIES_TOTAL: &str = "ferry_queries_total";
const PAYLOAD_BYTES: &str = "ferry_payload_bytes";

/// Prometheus-backed metrics registry shared across the pipeline.
#[derive(Clone)]
pub struct Metrics {
    inner: std::sync::Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    stage_total: IntCounterVec,
    records_total: IntCounterVec,
    invocations_total: IntCounterVec,
    queries_total: IntCounterVec,
    payload_bytes: Histogram,
}

/// Point-in-time view of the headline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Records delivered.
    pub records_succeeded: u64,
    /// Records that failed.
    pub records_failed: u64,
    /// Invocations that finished without error.
    pub invocations_succeeded: u64,
    /// Invocations that returned an error.
    pub invocations_failed: u64,
    /// Payloads observed by the size histogram.
    pub payloads_observed: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built
    /// or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let stage_total = counter_vec(
            STAGE_TOTAL,
            "Record pipeline stages executed by status",
            &["stage", "status"],
        )?;
        let records_total = counter_vec(RECORDS_TOTAL, "Records processed by outcome", &["outcome"])?;
        let invocations_total = counter_vec(
            INVOCATIONS_TOTAL,
            "Handler invocations by outcome",
            &["outcome"],
        )?;
        let queries_total =
            counter_vec(QUERIES_TOTAL, "Scheduled query submissions by outcome", &["outcome"])?;
        let buckets = exponential_buckets(1_024.0, 4.0, 12)
            .map_err(|source| TelemetryError::collector(PAYLOAD_BYTES, source))?;
        let payload_bytes = Histogram::with_opts(
            HistogramOpts::new(PAYLOAD_BYTES, "Size of fetched source objects in bytes")
                .buckets(buckets),
        )
        .map_err(|source| TelemetryError::collector(PAYLOAD_BYTES, source))?;

        register(&registry, STAGE_TOTAL, stage_total.clone())?;
        register(&registry, RECORDS_TOTAL, records_total.clone())?;
        register(&registry, INVOCATIONS_TOTAL, invocations_total.clone())?;
        register(&registry, QUERIES_TOTAL, queries_total.clone())?;
        register(&registry, PAYLOAD_BYTES, payload_bytes.clone())?;

        Ok(Self {
            inner: std::sync::Arc::new(MetricsInner {
                registry,
                stage_total,
                records_total,
                invocations_total,
                queries_total,
                payload_bytes,
            }),
        })
    }

    /// Increment the stage counter.
    pub fn inc_stage(&self, stage: &str, status: &str) {
        self.inner
            .stage_total
            .with_label_values(&[stage, status])
            .inc();
    }

    /// Increment the per-record outcome counter.
    pub fn inc_record(&self, succeeded: bool) {
        self.inner
            .records_total
            .with_label_values(&[outcome_label(succeeded)])
            .inc();
    }

    /// Increment the invocation outcome counter.
    pub fn inc_invocation(&self, succeeded: bool) {
        self.inner
            .invocations_total
            .with_label_values(&[outcome_label(succeeded)])
            .inc();
    }

    /// Increment the query submission counter.
    pub fn inc_query(&self, succeeded: bool) {
        self.inner
            .queries_total
            .with_label_values(&[outcome_label(succeeded)])
            .inc();
    }

    /// Record the size of a fetched payload.
    #[allow(clippy::cast_precision_loss)]
    pub fn observe_payload_bytes(&self, bytes: u64) {
        self.inner.payload_bytes.observe(bytes as f64);
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Take a point-in-time snapshot of the headline counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let records = |label: &str| self.inner.records_total.with_label_values(&[label]).get();
        let invocations = |label: &str| {
            self.inner
                .invocations_total
                .with_label_values(&[label])
                .get()
        };
        MetricsSnapshot {
            records_succeeded: records("success"),
            records_failed: records("failure"),
            invocations_succeeded: invocations("success"),
            invocations_failed: invocations("failure"),
            payloads_observed: self.inner.payload_bytes.get_sample_count(),
        }
    }
}

const fn outcome_label(succeeded: bool) -> &'static str {
    if succeeded { "success" } else { "failure" }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::collector(name, source))
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::register(name, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_stage("fetch", "completed");
        metrics.inc_stage("deliver", "failed");
        metrics.inc_record(true);
        metrics.inc_record(true);
        metrics.inc_record(false);
        metrics.inc_invocation(false);
        metrics.inc_query(true);
        metrics.observe_payload_bytes(4_096);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_succeeded, 2);
        assert_eq!(snapshot.records_failed, 1);
        assert_eq!(snapshot.invocations_succeeded, 0);
        assert_eq!(snapshot.invocations_failed, 1);
        assert_eq!(snapshot.payloads_observed, 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("ferry_stage_total"));
        assert!(rendered.contains("stage=\"deliver\""));
        assert!(rendered.contains("ferry_payload_bytes_bucket"));
        assert!(rendered.contains("ferry_queries_total"));
        Ok(())
    }

    #[test]
    fn registries_are_independent() -> Result<()> {
        let first = Metrics::new()?;
        let second = Metrics::new()?;
        first.inc_record(true);
        assert_eq!(second.snapshot(), MetricsSnapshot::default());
        Ok(())
    }
}
