//! Lambda handlers for the upload and query functions.
//!
//! # Design
//! - Handlers translate between Lambda payloads and pipeline types; they hold no state.
//! - Pipeline errors are logged once here and surfaced to the runtime as failed invocations.

use ferry_pipeline::{InvocationReport, Pipeline, QueryJob, TransferOutcome, TriggerEvent};
use lambda_runtime::LambdaEvent;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Summary returned to the caller of the upload function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResponse {
    /// Correlation id shared with logs and events.
    pub invocation_id: Uuid,
    /// Logical date used for naming, `YYYY-MM-DD`.
    pub logical_date: String,
    /// File names written at the transfer endpoint.
    pub delivered: Vec<String>,
    /// Records that failed under the partial outcome policy.
    pub failed: Vec<FailedRecord>,
}

/// One failed record in an [`UploadResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    /// Source object key.
    pub key: String,
    /// Stage that failed.
    pub stage: String,
    /// Error message.
    pub error: String,
}

impl From<&InvocationReport> for UploadResponse {
    fn from(report: &InvocationReport) -> Self {
        let mut delivered = Vec::new();
        let mut failed = Vec::new();
        for outcome in &report.outcomes {
            match outcome {
                TransferOutcome::Delivered(done) => delivered.push(done.destination.clone()),
                TransferOutcome::Failed(failure) => failed.push(FailedRecord {
                    key: failure.record.key.clone(),
                    stage: failure.stage.as_str().to_string(),
                    error: failure.error.to_string(),
                }),
            }
        }
        Self {
            invocation_id: report.invocation_id,
            logical_date: report.logical_date.to_string(),
            delivered,
            failed,
        }
    }
}

/// Payload of the scheduled query trigger; everything but the override is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScheduledEvent {
    /// Optional `YYYY-MM-DD` logical date override.
    #[serde(rename = "When", default)]
    pub when: Option<String>,
}

/// Summary returned by the query function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    /// Execution id assigned by the query service.
    pub execution_id: String,
    /// Date the query covers, `YYYY-MM-DD`.
    pub date: String,
}

/// Run one trigger event through the pipeline.
///
/// # Errors
///
/// Returns [`AppError::Pipeline`] when the invocation fails.
pub async fn deliver(pipeline: &Pipeline, event: &TriggerEvent) -> AppResult<UploadResponse> {
    match pipeline.process(event).await {
        Ok(report) => Ok(UploadResponse::from(&report)),
        Err(err) => {
            error!(error = %err, fatal = err.is_invocation_fatal(), "upload invocation failed");
            Err(AppError::pipeline("pipeline.process", err))
        }
    }
}

/// Submit the scheduled query.
///
/// # Errors
///
/// Returns [`AppError::Pipeline`] when the submission fails.
pub async fn submit(job: &QueryJob, event: &ScheduledEvent) -> AppResult<QueryResponse> {
    let submission = job
        .run(event.when.as_deref())
        .await
        .map_err(|err| AppError::pipeline("query.run", err))?;
    Ok(QueryResponse {
        execution_id: submission.execution_id,
        date: submission.request.date.to_string(),
    })
}

/// Lambda entry for object-created notifications.
///
/// # Errors
///
/// Propagates [`deliver`] failures to the runtime.
pub async fn handle_upload(
    pipeline: &Pipeline,
    event: LambdaEvent<TriggerEvent>,
) -> Result<UploadResponse, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    info!(
        request_id = %context.request_id,
        records = payload.records.len(),
        "upload invocation received"
    );
    Ok(deliver(pipeline, &payload).await?)
}

/// Lambda entry for the scheduled query trigger.
///
/// # Errors
///
/// Propagates [`submit`] failures to the runtime.
pub async fn handle_query(
    job: &QueryJob,
    event: LambdaEvent<ScheduledEvent>,
) -> Result<QueryResponse, lambda_runtime::Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, "query invocation received");
    Ok(submit(job, &payload).await?)
}
