use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail, ensure};
use ferry_config::{DeliveryMode, FerryConfig, OutcomePolicy, RecordSelection};
use ferry_events::{Event, EventBus};
use ferry_pipeline::{
    ArchiveWarning, InvocationReport, Pipeline, PipelineDeps, PipelineError, Record, Stage,
    TransferOutcome, TriggerEvent,
};
use ferry_telemetry::Metrics;
use ferry_test_support::fixtures::{
    TEST_MIRROR_BUCKET, TEST_SOURCE_BUCKET, ferry_config, fixed_now, single_entry,
};
use ferry_test_support::mocks::{
    CapturingTransfer, CountingCredentials, MemoryStorage, RecordingMetricsSink,
};
use tempfile::TempDir;

const CSV: &[u8] = b"path,views\n/world/2024/mar/01/story,1200\n";

struct Harness {
    scratch: TempDir,
    storage: MemoryStorage,
    transfer: CapturingTransfer,
    credentials: Arc<CountingCredentials>,
    sink: Arc<RecordingMetricsSink>,
    events: EventBus,
    metrics: Metrics,
}

impl Harness {
    fn new() -> Result<Self> {
        Self::with_credentials(CountingCredentials::granting())
    }

    fn with_credentials(credentials: Arc<CountingCredentials>) -> Result<Self> {
        Ok(Self {
            scratch: tempfile::tempdir()?,
            storage: MemoryStorage::new(),
            transfer: CapturingTransfer::new(),
            credentials,
            sink: RecordingMetricsSink::new(),
            events: EventBus::new(),
            metrics: Metrics::new()?,
        })
    }

    fn config(&self, delivery: DeliveryMode) -> FerryConfig {
        ferry_config(self.scratch.path(), delivery)
    }

    fn pipeline(&self, config: FerryConfig) -> Pipeline {
        let deps = PipelineDeps {
            credentials: self.credentials.clone(),
            storage: Arc::new(self.storage.clone()),
            transfer: Arc::new(self.transfer.clone()),
            metrics_sink: self.sink.clone(),
        };
        Pipeline::new(
            Arc::new(config),
            deps,
            self.events.clone(),
            self.metrics.clone(),
        )
    }

    fn seed(&self, key: &str) {
        self.storage.put_object(TEST_SOURCE_BUCKET, key, CSV.to_vec());
    }

    fn events(&self) -> Vec<Event> {
        self.events
            .backlog_since(0)
            .into_iter()
            .map(|envelope| envelope.event)
            .collect()
    }
}

fn event(keys: &[&str]) -> TriggerEvent {
    TriggerEvent {
        records: keys
            .iter()
            .map(|key| Record::new(TEST_SOURCE_BUCKET, *key))
            .collect(),
        when: None,
    }
}

fn scratch_files(root: &Path) -> Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if path.is_dir() {
            count += scratch_files(&path)?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}

fn only_delivered(report: &InvocationReport) -> Result<&ferry_pipeline::Delivered> {
    match report.outcomes.as_slice() {
        [TransferOutcome::Delivered(delivered)] => Ok(delivered),
        other => bail!("expected one delivered outcome, got {other:?}"),
    }
}

#[tokio::test]
async fn archive_mode_delivers_and_mirrors_dated_zip() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("exports/pageviews.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let trigger = event(&["exports/pageviews.csv"]).with_when("2024-03-01");
    let report = pipeline.process_at(&trigger, fixed_now()).await?;

    let delivered = only_delivered(&report)?;
    assert_eq!(delivered.destination, "theguardian_20240301.zip");
    assert_eq!(
        delivered.mirror.as_deref(),
        Some("s3://ferry-mirror/theguardian_20240301.zip")
    );
    assert!(delivered.warnings.is_empty());

    let uploads = harness.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].name, "theguardian_20240301.zip");
    assert_eq!(delivered.bytes_delivered, uploads[0].bytes.len() as u64);
    assert_eq!(
        single_entry(&uploads[0].bytes, "theguardian_20240301.csv")?,
        CSV
    );

    let mirrored = harness
        .storage
        .mirrored(TEST_MIRROR_BUCKET, "theguardian_20240301.zip");
    assert_eq!(mirrored.as_deref(), Some(uploads[0].bytes.as_slice()));
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    assert_eq!(harness.transfer.closed(), 1);
    Ok(())
}

#[tokio::test]
async fn passthrough_mode_streams_yesterdays_file_without_mirror() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("exports/pageviews.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Passthrough));

    let report = pipeline
        .process_at(&event(&["exports/pageviews.csv"]), fixed_now())
        .await?;

    let delivered = only_delivered(&report)?;
    assert_eq!(report.logical_date.to_string(), "2024-03-14");
    assert_eq!(delivered.destination, "theguardian_20240314.csv");
    assert_eq!(delivered.mirror, None);
    assert_eq!(delivered.bytes_delivered, CSV.len() as u64);

    let uploads = harness.transfer.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].bytes, CSV);
    assert_eq!(harness.storage.mirror_len(), 0);
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn ineligible_event_assumes_no_role() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("exports/readme.txt");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let report = pipeline
        .process_at(&event(&["exports/readme.txt"]), fixed_now())
        .await?;

    assert!(report.outcomes.is_empty());
    assert!(report.is_success());
    assert_eq!(harness.credentials.calls(), 0);
    assert_eq!(harness.transfer.connections(), 0);
    assert!(matches!(
        harness.events().as_slice(),
        [Event::InvocationCompleted {
            succeeded: 0,
            failed: 0,
            ..
        }]
    ));
    Ok(())
}

#[tokio::test]
async fn role_is_assumed_once_for_many_records() -> Result<()> {
    let harness = Harness::new()?;
    let keys = ["a.csv", "b.csv", "c.CSV"];
    for key in keys {
        harness.seed(key);
    }
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Passthrough));

    let report = pipeline.process_at(&event(&keys), fixed_now()).await?;

    assert_eq!(report.succeeded(), 3);
    assert_eq!(harness.credentials.calls(), 1);
    assert_eq!(harness.storage.clients_built(), 2);
    assert_eq!(harness.transfer.uploads().len(), 3);
    assert_eq!(harness.metrics.snapshot().records_succeeded, 3);
    assert_eq!(harness.sink.samples().len(), 3);
    Ok(())
}

#[tokio::test]
async fn first_selection_processes_one_record() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.seed("b.csv");
    let mut config = harness.config(DeliveryMode::Passthrough);
    config.selection = RecordSelection::First;
    let pipeline = harness.pipeline(config);

    let report = pipeline
        .process_at(&event(&["notes.txt", "a.csv", "b.csv"]), fixed_now())
        .await?;

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].record().key, "a.csv");
    Ok(())
}

#[tokio::test]
async fn rerun_delivers_identical_archive_and_overwrites_mirror() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("exports/pageviews.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));
    let trigger = event(&["exports/pageviews.csv"]).with_when("2024-03-01");

    pipeline.process_at(&trigger, fixed_now()).await?;
    pipeline.process_at(&trigger, fixed_now()).await?;

    let uploads = harness.transfer.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].bytes, uploads[1].bytes);
    assert_eq!(harness.storage.mirror_writes(), 2);
    assert_eq!(harness.storage.mirror_len(), 1);
    Ok(())
}

#[tokio::test]
async fn failing_record_is_isolated_and_named() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.seed("c.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let err = match pipeline
        .process_at(&event(&["a.csv", "missing.csv", "c.csv"]), fixed_now())
        .await
    {
        Ok(report) => bail!("expected aggregate failure, got {report:?}"),
        Err(err) => err,
    };

    let (total, failures) = match err {
        PipelineError::Aggregate { total, failures } => (total, failures),
        other => bail!("expected aggregate error, got {other:?}"),
    };
    assert_eq!(total, 3);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record.key, "missing.csv");
    assert_eq!(failures[0].stage, Stage::Fetch);
    assert!(matches!(failures[0].error, PipelineError::Fetch { .. }));

    assert_eq!(harness.transfer.uploads().len(), 2);
    assert_eq!(harness.storage.mirror_writes(), 2);
    let failed_events = harness
        .events()
        .into_iter()
        .filter(|event| matches!(event, Event::RecordFailed { .. }))
        .count();
    assert_eq!(failed_events, 1);

    let snapshot = harness.metrics.snapshot();
    assert_eq!(snapshot.records_succeeded, 2);
    assert_eq!(snapshot.records_failed, 1);
    assert_eq!(snapshot.invocations_failed, 1);
    Ok(())
}

#[tokio::test]
async fn partial_policy_returns_report_with_failures() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    let mut config = harness.config(DeliveryMode::Passthrough);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline
        .process_at(&event(&["a.csv", "missing.csv"]), fixed_now())
        .await?;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    let failure = report.failures().next();
    ensure!(failure.is_some(), "missing failure");
    assert!(failure.is_some_and(|failure| failure.record.key == "missing.csv"));
    assert_eq!(harness.metrics.snapshot().invocations_succeeded, 1);
    assert_eq!(harness.transfer.closed(), 2);
    Ok(())
}

#[tokio::test]
async fn stalled_fetch_times_out_and_leaves_no_scratch() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("slow.csv");
    harness.storage.stall("slow.csv");
    let mut config = harness.config(DeliveryMode::Archive);
    config.record_timeout = Duration::from_millis(200);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline
        .process_at(&event(&["slow.csv"]), fixed_now())
        .await?;

    let failure = report.failures().next();
    let Some(failure) = failure else {
        bail!("expected a timed out record");
    };
    assert_eq!(failure.stage, Stage::Fetch);
    assert!(matches!(failure.error, PipelineError::Timeout { .. }));
    assert_eq!(harness.transfer.uploads().len(), 0);
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn refused_role_is_fatal_before_any_transfer() -> Result<()> {
    let harness = Harness::with_credentials(CountingCredentials::denying())?;
    harness.seed("a.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let result = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await;

    assert!(matches!(result, Err(PipelineError::Authentication { .. })));
    assert_eq!(harness.credentials.calls(), 1);
    assert_eq!(harness.transfer.connections(), 0);
    assert_eq!(harness.metrics.snapshot().invocations_failed, 1);
    Ok(())
}

#[tokio::test]
async fn malformed_override_date_is_fatal() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let trigger = event(&["a.csv"]).with_when("2024-13-45");
    let result = pipeline.process_at(&trigger, fixed_now()).await;

    assert!(matches!(
        result,
        Err(PipelineError::InvalidInput { field: "When", .. })
    ));
    assert_eq!(harness.credentials.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn mirror_failure_fails_record_after_delivery() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.storage.fail_mirror();
    let mut config = harness.config(DeliveryMode::Archive);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let Some(failure) = report.failures().next() else {
        bail!("expected a mirror failure");
    };
    assert_eq!(failure.stage, Stage::Mirror);
    assert!(matches!(failure.error, PipelineError::Upload { .. }));
    assert_eq!(harness.transfer.uploads().len(), 1);
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn source_reset_mid_archive_removes_partial_scratch() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .storage
        .put_object(TEST_SOURCE_BUCKET, "a.csv", vec![b'x'; 16 * 1_024]);
    harness.storage.reset_after("a.csv", 4_096);
    let mut config = harness.config(DeliveryMode::Archive);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let Some(failure) = report.failures().next() else {
        bail!("expected an archive failure");
    };
    assert_eq!(failure.stage, Stage::Archive);
    assert!(matches!(failure.error, PipelineError::ArchiveWrite { .. }));
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    assert!(harness.transfer.uploads().is_empty());
    assert_eq!(harness.storage.mirror_len(), 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_keys_in_one_event_archive_independently() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let trigger = event(&["a.csv", "a.csv"]).with_when("2024-03-01");
    let report = pipeline.process_at(&trigger, fixed_now()).await?;

    assert_eq!(report.succeeded(), 2);
    let uploads = harness.transfer.uploads();
    assert_eq!(uploads.len(), 2);
    for upload in &uploads {
        assert_eq!(single_entry(&upload.bytes, "theguardian_20240301.csv")?, CSV);
    }
    let Some(mirrored) = harness
        .storage
        .mirrored(TEST_MIRROR_BUCKET, "theguardian_20240301.zip")
    else {
        bail!("expected a mirrored archive");
    };
    assert_eq!(single_entry(&mirrored, "theguardian_20240301.csv")?, CSV);
    assert_eq!(harness.storage.mirror_writes(), 2);
    assert_eq!(scratch_files(harness.scratch.path())?, 0);
    Ok(())
}

#[tokio::test]
async fn refused_login_fails_at_connect() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.transfer.refuse_login();
    let mut config = harness.config(DeliveryMode::Passthrough);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let Some(failure) = report.failures().next() else {
        bail!("expected a connection failure");
    };
    assert_eq!(failure.stage, Stage::Connect);
    assert!(matches!(failure.error, PipelineError::Connection { .. }));
    Ok(())
}

#[tokio::test]
async fn rejected_put_fails_at_deliver() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.transfer.fail_puts();
    let mut config = harness.config(DeliveryMode::Archive);
    config.outcome_policy = OutcomePolicy::Partial;
    let pipeline = harness.pipeline(config);

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let Some(failure) = report.failures().next() else {
        bail!("expected a write failure");
    };
    assert_eq!(failure.stage, Stage::Deliver);
    assert!(matches!(failure.error, PipelineError::Write { .. }));
    assert_eq!(harness.transfer.closed(), 1);
    Ok(())
}

#[tokio::test]
async fn metric_sink_failure_does_not_fail_record() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    let pipeline = Pipeline::new(
        Arc::new(harness.config(DeliveryMode::Passthrough)),
        PipelineDeps {
            credentials: harness.credentials.clone(),
            storage: Arc::new(harness.storage.clone()),
            transfer: Arc::new(harness.transfer.clone()),
            metrics_sink: RecordingMetricsSink::failing(),
        },
        harness.events.clone(),
        harness.metrics.clone(),
    );

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(harness.metrics.snapshot().payloads_observed, 1);
    Ok(())
}

#[tokio::test]
async fn declared_length_mismatch_is_reported_as_warning() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    harness.storage.declare_length("a.csv", 4_096);
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let delivered = only_delivered(&report)?;
    assert_eq!(
        delivered.warnings,
        vec![ArchiveWarning::LengthMismatch {
            declared: 4_096,
            observed: CSV.len() as u64,
        }]
    );
    assert_eq!(harness.sink.samples(), vec![("a.csv".to_string(), 4_096)]);
    Ok(())
}

#[tokio::test]
async fn lifecycle_events_share_one_invocation_id() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed("a.csv");
    let pipeline = harness.pipeline(harness.config(DeliveryMode::Archive));

    let report = pipeline.process_at(&event(&["a.csv"]), fixed_now()).await?;

    let events = harness.events();
    assert!(matches!(
        events.first(),
        Some(Event::InvocationStarted { records: 1, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(Event::InvocationCompleted {
            succeeded: 1,
            failed: 0,
            ..
        })
    ));
    assert!(
        events
            .iter()
            .all(|event| event.invocation_id() == Some(report.invocation_id))
    );
    assert_eq!(
        harness.events.invocation_events(report.invocation_id),
        events
    );

    let stages: Vec<(String, String)> = events
        .iter()
        .filter_map(|event| match event {
            Event::StageProgress { stage, status, .. } => Some((stage.clone(), status.clone())),
            _ => None,
        })
        .collect();
    for stage in ["fetch", "archive", "connect", "deliver", "mirror", "cleanup"] {
        assert!(
            stages.contains(&(stage.to_string(), "completed".to_string())),
            "{stage} never completed"
        );
    }
    Ok(())
}
