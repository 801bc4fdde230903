//! Record-transfer orchestration for one trigger event.
//!
//! # Design
//! - Invocation-fatal checks (override date, role assumption) run before any record work.
//! - Records run concurrently on the calling task; each is bounded by the record timeout
//!   and settles into its own [`TransferOutcome`].
//! - Every stage emits a progress event, a stage counter, and a structured log line.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use ferry_config::{DeliveryMode, FerryConfig, OutcomePolicy};
use ferry_events::{Event, EventBus};
use ferry_telemetry::{Metrics, invocation_span, record_span};
use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::archive::Archiver;
use crate::error::{PipelineError, PipelineResult};
use crate::model::{
    Delivered, InvocationReport, Record, RecordFailure, Stage, StageStatus, TransferOutcome,
    TriggerEvent,
};
use crate::naming::{DestinationName, eligible_records, logical_date};
use crate::ports::{
    ByteStream, CredentialProvider, FetchedObject, MetricsSink, MirrorUploader, ObjectFetcher,
    StorageFactory, TransferClient,
};
use crate::transfer::DeliverySession;

const METRICS_SAMPLE_TIMEOUT: Duration = Duration::from_secs(5);

/// External collaborators of a [`Pipeline`].
#[derive(Clone)]
pub struct PipelineDeps {
    /// Role assumption.
    pub credentials: Arc<dyn CredentialProvider>,
    /// Storage clients built from the assumed role.
    pub storage: Arc<dyn StorageFactory>,
    /// Transfer endpoint sessions.
    pub transfer: Arc<dyn TransferClient>,
    /// Best-effort payload size sink.
    pub metrics_sink: Arc<dyn MetricsSink>,
}

/// Delivers the eligible records of a trigger event.
pub struct Pipeline {
    config: Arc<FerryConfig>,
    deps: PipelineDeps,
    archiver: Archiver,
    events: EventBus,
    metrics: Metrics,
}

struct StageFailure {
    stage: Stage,
    error: PipelineError,
}

/// Last stage a record entered, read back when the record times out.
struct StageCursor(Mutex<Stage>);

impl StageCursor {
    const fn new() -> Self {
        Self(Mutex::new(Stage::Fetch))
    }

    fn set(&self, stage: Stage) {
        *self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = stage;
    }

    fn get(&self) -> Stage {
        *self
            .0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Per-record context shared by its stages.
struct RecordScope<'a> {
    invocation_id: Uuid,
    /// Distinguishes records naming the same object; keys the scratch path.
    record_id: Uuid,
    record: &'a Record,
    cursor: &'a StageCursor,
}

/// Clients built once from the assumed role.
struct InvocationClients {
    fetcher: Arc<dyn ObjectFetcher>,
    mirror: Arc<dyn MirrorUploader>,
}

impl Pipeline {
    /// Assemble a pipeline; the scratch root comes from `config`.
    #[must_use]
    pub fn new(
        config: Arc<FerryConfig>,
        deps: PipelineDeps,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        let archiver =
            Archiver::new(config.scratch_dir.clone()).with_read_timeout(config.record_timeout);
        Self {
            config,
            deps,
            archiver,
            events,
            metrics,
        }
    }

    /// Process `event` relative to the current time.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::process_at`].
    pub async fn process(&self, event: &TriggerEvent) -> PipelineResult<InvocationReport> {
        self.process_at(event, Utc::now()).await
    }

    /// Process `event` with an explicit "now" for the yesterday fallback.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for a malformed override date,
    /// [`PipelineError::Authentication`] if the role cannot be assumed, and
    /// [`PipelineError::Aggregate`] when any record fails under the
    /// all-or-nothing policy.
    pub async fn process_at(
        &self,
        event: &TriggerEvent,
        now: DateTime<Utc>,
    ) -> PipelineResult<InvocationReport> {
        let invocation_id = Uuid::new_v4();
        let span = invocation_span(invocation_id);
        let result = self
            .run_invocation(invocation_id, event, now)
            .instrument(span)
            .await;
        self.metrics.inc_invocation(result.is_ok());
        result
    }

    async fn run_invocation(
        &self,
        invocation_id: Uuid,
        event: &TriggerEvent,
        now: DateTime<Utc>,
    ) -> PipelineResult<InvocationReport> {
        let logical_date = logical_date(event.when.as_deref(), now).inspect_err(|err| {
            error!(error = %err, when = ?event.when, "rejecting trigger event");
        })?;
        let destination = DestinationName::new(&self.config.naming.prefix, logical_date);
        let records = eligible_records(event, &self.config.naming, self.config.selection);
        tracing::Span::current().record("records", records.len());

        if records.is_empty() {
            info!(
                received = event.records.len(),
                suffix = %self.config.naming.key_suffix,
                "no eligible records"
            );
            self.publish_completed(invocation_id, 0, 0);
            return Ok(InvocationReport {
                invocation_id,
                logical_date,
                outcomes: Vec::new(),
            });
        }

        let _ = self.events.publish(Event::InvocationStarted {
            invocation_id,
            records: records.len(),
        });
        info!(
            records = records.len(),
            destination = %destination,
            mode = self.config.delivery.as_str(),
            "processing trigger event"
        );

        let clients = self.authenticate().await?;
        let outcomes = join_all(
            records
                .into_iter()
                .map(|record| self.run_record(invocation_id, &clients, &destination, record)),
        )
        .await;

        let report = InvocationReport {
            invocation_id,
            logical_date,
            outcomes,
        };
        self.publish_completed(invocation_id, report.succeeded(), report.failed());
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "invocation settled"
        );

        match self.config.outcome_policy {
            OutcomePolicy::AllOrNothing if !report.is_success() => Err(report.into_aggregate()),
            _ => Ok(report),
        }
    }

    async fn authenticate(&self) -> PipelineResult<InvocationClients> {
        let stage = Stage::Authenticate;
        self.metrics
            .inc_stage(stage.as_str(), StageStatus::Started.as_str());
        match self.deps.credentials.assume_role(&self.config.role).await {
            Ok(session) => {
                self.metrics
                    .inc_stage(stage.as_str(), StageStatus::Completed.as_str());
                info!(role = %self.config.role.role_arn, "assumed delegated role");
                Ok(InvocationClients {
                    fetcher: self.deps.storage.fetcher(&session),
                    mirror: self.deps.storage.mirror(&session),
                })
            }
            Err(source) => {
                self.metrics
                    .inc_stage(stage.as_str(), StageStatus::Failed.as_str());
                let err = PipelineError::Authentication {
                    role: self.config.role.role_arn.clone(),
                    source,
                };
                error!(role = %self.config.role.role_arn, error = %err, "role assumption failed");
                Err(err)
            }
        }
    }

    async fn run_record(
        &self,
        invocation_id: Uuid,
        clients: &InvocationClients,
        destination: &DestinationName,
        record: Record,
    ) -> TransferOutcome {
        let span = record_span(&record.bucket, &record.key, destination.stem());
        async {
            let _ = self.events.publish(Event::RecordStarted {
                invocation_id,
                bucket: record.bucket.clone(),
                key: record.key.clone(),
            });
            let cursor = StageCursor::new();
            let scope = RecordScope {
                invocation_id,
                record_id: Uuid::new_v4(),
                record: &record,
                cursor: &cursor,
            };
            let pipeline = async {
                match self.config.delivery {
                    DeliveryMode::Archive => self.archive_record(&scope, clients, destination).await,
                    DeliveryMode::Passthrough => {
                        self.passthrough_record(&scope, clients, destination).await
                    }
                }
            };
            let result = match tokio::time::timeout(self.config.record_timeout, pipeline).await {
                Ok(result) => result,
                Err(_) => Err(self.timed_out(&scope).await),
            };
            self.settle(&scope, result)
        }
        .instrument(span)
        .await
    }

    async fn timed_out(&self, scope: &RecordScope<'_>) -> StageFailure {
        let stage = scope.cursor.get();
        self.record_stage(scope, stage, StageStatus::Failed);
        if self.config.delivery == DeliveryMode::Archive
            && let Ok(path) = self
                .archiver
                .scratch_path(&scope.record.bucket, &scope.record.key, scope.record_id)
            && let Err(err) = self.archiver.discard(&path).await
        {
            warn!(path = %path.display(), error = %err, "scratch archive left behind after timeout");
        }
        StageFailure {
            stage,
            error: PipelineError::Timeout {
                bucket: scope.record.bucket.clone(),
                key: scope.record.key.clone(),
                after: self.config.record_timeout,
            },
        }
    }

    fn settle(
        &self,
        scope: &RecordScope<'_>,
        result: Result<Delivered, StageFailure>,
    ) -> TransferOutcome {
        let record = scope.record.clone();
        match result {
            Ok(delivered) => {
                self.metrics.inc_record(true);
                let _ = self.events.publish(Event::RecordCompleted {
                    invocation_id: scope.invocation_id,
                    key: record.key.clone(),
                    destination: delivered.destination.clone(),
                    bytes_delivered: delivered.bytes_delivered,
                });
                info!(
                    destination = %delivered.destination,
                    mirror = ?delivered.mirror,
                    bytes = delivered.bytes_delivered,
                    "record delivered"
                );
                TransferOutcome::Delivered(delivered)
            }
            Err(StageFailure { stage, error }) => {
                self.metrics.inc_record(false);
                let _ = self.events.publish(Event::RecordFailed {
                    invocation_id: scope.invocation_id,
                    key: record.key.clone(),
                    stage: stage.as_str().to_string(),
                    message: render_chain(&error),
                });
                error!(stage = stage.as_str(), error = %render_chain(&error), "record failed");
                TransferOutcome::Failed(RecordFailure {
                    record,
                    stage,
                    error,
                })
            }
        }
    }

    async fn archive_record(
        &self,
        scope: &RecordScope<'_>,
        clients: &InvocationClients,
        destination: &DestinationName,
    ) -> Result<Delivered, StageFailure> {
        let record = scope.record;
        let object = self
            .run_stage(scope, Stage::Fetch, self.fetch(clients, record))
            .await?;
        self.sample_payload(record, object.content_length).await;

        let entry_name = destination.with_suffix(&self.config.naming.key_suffix);
        let archived = self
            .run_stage(scope, Stage::Archive, async {
                let path = self
                    .archiver
                    .scratch_path(&record.bucket, &record.key, scope.record_id)?;
                self.archiver.archive(object, &entry_name, &path).await
            })
            .await?;

        let archive_name = destination.archive_name();
        let mirror_bucket = &self.config.mirror_bucket;
        let (delivered, mirrored) = tokio::join!(
            self.deliver_file(scope, &archived.path, &archive_name),
            self.run_stage(scope, Stage::Mirror, async {
                clients
                    .mirror
                    .upload(&archived.path, mirror_bucket, &archive_name)
                    .await
                    .map_err(|source| PipelineError::Upload {
                        bucket: mirror_bucket.clone(),
                        key: archive_name.clone(),
                        source,
                    })
            }),
        );

        if self
            .run_stage(scope, Stage::Cleanup, self.archiver.discard(&archived.path))
            .await
            .is_err()
        {
            warn!(path = %archived.path.display(), "scratch archive was not removed");
        }

        match (delivered, mirrored) {
            (Ok(bytes_delivered), Ok(())) => Ok(Delivered {
                record: record.clone(),
                destination: archive_name.clone(),
                mirror: Some(format!("s3://{mirror_bucket}/{archive_name}")),
                bytes_delivered,
                warnings: archived.warnings,
            }),
            (Err(delivery), Err(mirror)) => {
                error!(
                    stage = mirror.stage.as_str(),
                    error = %render_chain(&mirror.error),
                    "mirror upload failed alongside delivery"
                );
                Err(delivery)
            }
            (Err(failure), Ok(())) | (Ok(_), Err(failure)) => Err(failure),
        }
    }

    async fn passthrough_record(
        &self,
        scope: &RecordScope<'_>,
        clients: &InvocationClients,
        destination: &DestinationName,
    ) -> Result<Delivered, StageFailure> {
        let record = scope.record;
        let mut session = DeliverySession::new(self.config.transfer.address());
        self.run_stage(
            scope,
            Stage::Connect,
            session.connect(self.deps.transfer.as_ref(), &self.config.transfer),
        )
        .await?;

        let fetched = self
            .run_stage(scope, Stage::Fetch, async {
                let object = self.fetch(clients, record).await?;
                let length = object.content_length;
                Ok::<_, PipelineError>((await_readable(record, object).await?, length))
            })
            .await;
        let (body, content_length) = match fetched {
            Ok(ready) => ready,
            Err(failure) => {
                session.abort().await;
                return Err(failure);
            }
        };
        self.sample_payload(record, content_length).await;

        let name = destination.with_suffix(&self.config.naming.key_suffix);
        let bytes_delivered = self
            .run_stage(scope, Stage::Deliver, async {
                session.put(body, &name).await?;
                session.close().await
            })
            .await?;

        Ok(Delivered {
            record: record.clone(),
            destination: name,
            mirror: None,
            bytes_delivered,
            warnings: Vec::new(),
        })
    }

    async fn deliver_file(
        &self,
        scope: &RecordScope<'_>,
        path: &Path,
        name: &str,
    ) -> Result<u64, StageFailure> {
        let mut session = DeliverySession::new(self.config.transfer.address());
        self.run_stage(
            scope,
            Stage::Connect,
            session.connect(self.deps.transfer.as_ref(), &self.config.transfer),
        )
        .await?;
        self.run_stage(scope, Stage::Deliver, async {
            let file = match tokio::fs::File::open(path).await {
                Ok(file) => file,
                Err(source) => {
                    session.abort().await;
                    return Err(PipelineError::Write {
                        destination: name.to_string(),
                        source: Box::new(source),
                    });
                }
            };
            session.put(Box::new(file), name).await?;
            session.close().await
        })
        .await
    }

    async fn fetch(
        &self,
        clients: &InvocationClients,
        record: &Record,
    ) -> PipelineResult<FetchedObject> {
        clients
            .fetcher
            .fetch(&record.bucket, &record.key)
            .await
            .map_err(|source| PipelineError::Fetch {
                bucket: record.bucket.clone(),
                key: record.key.clone(),
                source,
            })
    }

    async fn sample_payload(&self, record: &Record, content_length: Option<u64>) {
        let Some(bytes) = content_length else {
            return;
        };
        self.metrics.observe_payload_bytes(bytes);
        match tokio::time::timeout(
            METRICS_SAMPLE_TIMEOUT,
            self.deps.metrics_sink.record_payload_size(&record.key, bytes),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, bytes, "payload size sample was not recorded"),
            Err(_) => warn!(bytes, "payload size sample timed out"),
        }
    }

    async fn run_stage<T, F>(
        &self,
        scope: &RecordScope<'_>,
        stage: Stage,
        op: F,
    ) -> Result<T, StageFailure>
    where
        F: Future<Output = PipelineResult<T>>,
    {
        scope.cursor.set(stage);
        self.record_stage(scope, stage, StageStatus::Started);
        match op.await {
            Ok(value) => {
                self.record_stage(scope, stage, StageStatus::Completed);
                Ok(value)
            }
            Err(error) => {
                self.record_stage(scope, stage, StageStatus::Failed);
                warn!(stage = stage.as_str(), error = %render_chain(&error), "stage failed");
                Err(StageFailure { stage, error })
            }
        }
    }

    fn record_stage(&self, scope: &RecordScope<'_>, stage: Stage, status: StageStatus) {
        self.metrics.inc_stage(stage.as_str(), status.as_str());
        let _ = self.events.publish(Event::StageProgress {
            invocation_id: scope.invocation_id,
            key: scope.record.key.clone(),
            stage: stage.as_str().to_string(),
            status: status.as_str().to_string(),
        });
    }

    fn publish_completed(&self, invocation_id: Uuid, succeeded: usize, failed: usize) {
        let _ = self.events.publish(Event::InvocationCompleted {
            invocation_id,
            succeeded,
            failed,
        });
    }
}

/// Wait until the source has bytes (or a clean EOF) before a put begins.
async fn await_readable(record: &Record, object: FetchedObject) -> PipelineResult<ByteStream> {
    let mut reader = BufReader::new(object.body);
    reader
        .fill_buf()
        .await
        .map_err(|source| PipelineError::Fetch {
            bucket: record.bucket.clone(),
            key: record.key.clone(),
            source: Box::new(source),
        })?;
    Ok(Box::new(reader))
}

/// Error message followed by its source chain.
fn render_chain(error: &PipelineError) -> String {
    let mut rendered = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
