//! Payload size datum published to `CloudWatch`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_cloudwatch::types::{MetricDatum, StandardUnit};
use ferry_pipeline::{BoxError, MetricsSink};
use tracing::debug;

use crate::error::AwsError;

const METRIC_NAME: &str = "SizeOfCSV";
const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Publishes the size of each fetched object, in megabytes, under one namespace.
#[derive(Debug, Clone)]
pub struct CloudWatchMetricsSink {
    client: aws_sdk_cloudwatch::Client,
    namespace: String,
}

impl CloudWatchMetricsSink {
    /// Sink using the ambient identity.
    #[must_use]
    pub fn new(config: &SdkConfig, namespace: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_cloudwatch::Client::new(config),
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl MetricsSink for CloudWatchMetricsSink {
    async fn record_payload_size(&self, key: &str, bytes: u64) -> Result<(), BoxError> {
        let value = megabytes(bytes);
        let datum = MetricDatum::builder()
            .metric_name(METRIC_NAME)
            .unit(StandardUnit::Megabytes)
            .value(value)
            .build();
        self.client
            .put_metric_data()
            .namespace(&self.namespace)
            .metric_data(datum)
            .send()
            .await
            .map_err(|err| AwsError::request("cloudwatch", "PutMetricData", err))?;
        debug!(key, megabytes = value, "payload size published");
        Ok(())
    }
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MEGABYTE
}
