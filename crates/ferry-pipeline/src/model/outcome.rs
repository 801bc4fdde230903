use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::{ArchiveWarning, PipelineError};
use crate::model::Record;

/// Pipeline stage a record passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Delegated role assumption, once per invocation.
    Authenticate,
    /// Retrieving the source object.
    Fetch,
    /// Writing the single-entry archive.
    Archive,
    /// Opening the transfer session.
    Connect,
    /// Writing to the transfer endpoint and closing the session.
    Deliver,
    /// Uploading the archive to the mirror bucket.
    Mirror,
    /// Removing the scratch archive.
    Cleanup,
}

impl Stage {
    /// Stable lowercase label used in logs, events, and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authenticate => "authenticate",
            Self::Fetch => "fetch",
            Self::Archive => "archive",
            Self::Connect => "connect",
            Self::Deliver => "deliver",
            Self::Mirror => "mirror",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Status reported for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// The stage began.
    Started,
    /// The stage finished successfully.
    Completed,
    /// The stage failed.
    Failed,
}

impl StageStatus {
    /// Stable lowercase label used in logs, events, and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Successful delivery of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    /// Source record.
    pub record: Record,
    /// File name written at the transfer endpoint.
    pub destination: String,
    /// `s3://bucket/key` of the mirror copy, archive mode only.
    pub mirror: Option<String>,
    /// Bytes written at the transfer endpoint.
    pub bytes_delivered: u64,
    /// Recoverable archive issues observed on the way.
    pub warnings: Vec<ArchiveWarning>,
}

/// Failed record with the stage that failed.
#[derive(Debug)]
pub struct RecordFailure {
    /// Source record.
    pub record: Record,
    /// Stage that failed.
    pub stage: Stage,
    /// Underlying error.
    pub error: PipelineError,
}

/// Settled result of one record pipeline.
#[derive(Debug)]
pub enum TransferOutcome {
    /// The record reached every destination.
    Delivered(Delivered),
    /// The record failed at some stage.
    Failed(RecordFailure),
}

impl TransferOutcome {
    /// Source record regardless of outcome.
    #[must_use]
    pub const fn record(&self) -> &Record {
        match self {
            Self::Delivered(delivered) => &delivered.record,
            Self::Failed(failure) => &failure.record,
        }
    }

    /// Whether the record was delivered.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered(_))
    }
}

/// Everything one invocation produced, in event order.
#[derive(Debug)]
pub struct InvocationReport {
    /// Correlation id shared by logs and events.
    pub invocation_id: Uuid,
    /// Date the destination names were derived from.
    pub logical_date: NaiveDate,
    /// Per-record outcomes.
    pub outcomes: Vec<TransferOutcome>,
}

impl InvocationReport {
    /// Records delivered.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    /// Records that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Whether every record was delivered; true for an empty report.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Failed records, in event order.
    pub fn failures(&self) -> impl Iterator<Item = &RecordFailure> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            TransferOutcome::Failed(failure) => Some(failure),
            TransferOutcome::Delivered(_) => None,
        })
    }

    /// Convert into an aggregate error naming every failed record.
    #[must_use]
    pub fn into_aggregate(self) -> PipelineError {
        let total = self.outcomes.len();
        let failures = self
            .outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                TransferOutcome::Failed(failure) => Some(failure),
                TransferOutcome::Delivered(_) => None,
            })
            .collect();
        PipelineError::Aggregate { total, failures }
    }
}
