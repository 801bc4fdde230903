//! Event payload types emitted while an invocation runs.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event published on a bus.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed lifecycle events for deliveries and the query job.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An invocation selected its eligible records.
    InvocationStarted {
        /// Correlation id shared by every event of the invocation.
        invocation_id: Uuid,
        /// Number of records that will be processed.
        records: usize,
    },
    /// Processing of one record began.
    RecordStarted {
        /// Correlation id of the owning invocation.
        invocation_id: Uuid,
        /// Source bucket.
        bucket: String,
        /// Source object key.
        key: String,
    },
    /// A pipeline stage of one record changed status.
    StageProgress {
        /// Correlation id of the owning invocation.
        invocation_id: Uuid,
        /// Source object key the stage belongs to.
        key: String,
        /// Stage name such as `fetch` or `deliver`.
        stage: String,
        /// Stage status such as `started` or `failed`.
        status: String,
    },
    /// A record reached the endpoint.
    RecordCompleted {
        /// Correlation id of the owning invocation.
        invocation_id: Uuid,
        /// Source object key.
        key: String,
        /// File name written at the endpoint.
        destination: String,
        /// Bytes written at the endpoint.
        bytes_delivered: u64,
    },
    /// A record failed at some stage.
    RecordFailed {
        /// Correlation id of the owning invocation.
        invocation_id: Uuid,
        /// Source object key.
        key: String,
        /// Stage that failed.
        stage: String,
        /// Rendered error detail.
        message: String,
    },
    /// All records of an invocation have settled.
    InvocationCompleted {
        /// Correlation id of the invocation.
        invocation_id: Uuid,
        /// Records delivered.
        succeeded: usize,
        /// Records that failed.
        failed: usize,
    },
    /// The scheduled query was accepted by the query service.
    QuerySubmitted {
        /// Execution id returned by the service.
        execution_id: String,
        /// Logical date the query covers, `YYYY-MM-DD`.
        date: String,
    },
}

impl Event {
    /// Machine-friendly discriminator for log and progress consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvocationStarted { .. } => "invocation_started",
            Self::RecordStarted { .. } => "record_started",
            Self::StageProgress { .. } => "stage_progress",
            Self::RecordCompleted { .. } => "record_completed",
            Self::RecordFailed { .. } => "record_failed",
            Self::InvocationCompleted { .. } => "invocation_completed",
            Self::QuerySubmitted { .. } => "query_submitted",
        }
    }

    /// Invocation correlation id, when the event belongs to one.
    #[must_use]
    pub const fn invocation_id(&self) -> Option<Uuid> {
        match self {
            Self::InvocationStarted { invocation_id, .. }
            | Self::RecordStarted { invocation_id, .. }
            | Self::StageProgress { invocation_id, .. }
            | Self::RecordCompleted { invocation_id, .. }
            | Self::RecordFailed { invocation_id, .. }
            | Self::InvocationCompleted { invocation_id, .. } => Some(*invocation_id),
            Self::QuerySubmitted { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}
