use std::sync::Arc;

use anyhow::Result;
use ferry_events::{Event, EventBus};
use ferry_pipeline::{PipelineError, QueryJob, request_token};
use ferry_telemetry::Metrics;
use ferry_test_support::fixtures::{fixed_now, query_config};
use ferry_test_support::mocks::{CountingCredentials, FakeQueryFactory, FakeQueryService};

struct QueryHarness {
    credentials: Arc<CountingCredentials>,
    service: Arc<FakeQueryService>,
    events: EventBus,
    metrics: Metrics,
}

impl QueryHarness {
    fn new(credentials: Arc<CountingCredentials>, service: Arc<FakeQueryService>) -> Result<Self> {
        Ok(Self {
            credentials,
            service,
            events: EventBus::new(),
            metrics: Metrics::new()?,
        })
    }

    fn job(&self) -> QueryJob {
        QueryJob::new(
            Arc::new(query_config()),
            self.credentials.clone(),
            Arc::new(FakeQueryFactory::new(self.service.clone())),
            self.events.clone(),
            self.metrics.clone(),
        )
    }
}

#[tokio::test]
async fn submits_yesterdays_query_by_default() -> Result<()> {
    let harness = QueryHarness::new(
        CountingCredentials::granting(),
        FakeQueryService::accepting(),
    )?;

    let submission = harness.job().run_at(None, fixed_now()).await?;

    assert_eq!(submission.request.date.to_string(), "2024-03-14");
    assert!(
        submission
            .request
            .sql
            .contains("received_date = date'2024-03-14'")
    );
    assert_eq!(submission.request.database, "clean");
    assert_eq!(
        submission.request.output_location,
        "s3://ferry-query-results/"
    );
    assert_eq!(
        submission.execution_id,
        format!("exec-{}", submission.request.client_request_token)
    );
    assert_eq!(harness.credentials.calls(), 1);
    assert_eq!(harness.service.sessions(), 1);

    let events: Vec<Event> = harness
        .events
        .backlog_since(0)
        .into_iter()
        .map(|envelope| envelope.event)
        .collect();
    assert_eq!(
        events,
        vec![Event::QuerySubmitted {
            execution_id: submission.execution_id.clone(),
            date: "2024-03-14".into(),
        }]
    );
    assert!(
        harness
            .metrics
            .render()?
            .contains("ferry_queries_total{outcome=\"success\"} 1")
    );
    Ok(())
}

#[tokio::test]
async fn override_date_yields_stable_token() -> Result<()> {
    let harness = QueryHarness::new(
        CountingCredentials::granting(),
        FakeQueryService::accepting(),
    )?;
    let job = harness.job();

    let first = job.run_at(Some("2019-03-04"), fixed_now()).await?;
    let second = job.run_at(Some("2019-03-04"), fixed_now()).await?;

    assert_eq!(
        first.request.client_request_token,
        second.request.client_request_token
    );
    assert_eq!(
        first.request.client_request_token,
        request_token("clean", first.request.date)
    );
    assert_eq!(harness.service.requests().len(), 2);
    Ok(())
}

#[tokio::test]
async fn refused_role_is_an_authentication_error() -> Result<()> {
    let harness = QueryHarness::new(
        CountingCredentials::denying(),
        FakeQueryService::accepting(),
    )?;

    let result = harness.job().run_at(None, fixed_now()).await;

    assert!(matches!(result, Err(PipelineError::Authentication { .. })));
    assert!(harness.service.requests().is_empty());
    assert!(harness.events.backlog_since(0).is_empty());
    Ok(())
}

#[tokio::test]
async fn refused_query_is_a_query_error() -> Result<()> {
    let harness = QueryHarness::new(
        CountingCredentials::granting(),
        FakeQueryService::refusing(),
    )?;

    let result = harness.job().run_at(None, fixed_now()).await;

    assert!(matches!(
        result,
        Err(PipelineError::Query { ref database, .. }) if database == "clean"
    ));
    assert!(
        harness
            .metrics
            .render()?
            .contains("ferry_queries_total{outcome=\"failure\"} 1")
    );
    Ok(())
}

#[tokio::test]
async fn malformed_override_skips_role_assumption() -> Result<()> {
    let harness = QueryHarness::new(
        CountingCredentials::granting(),
        FakeQueryService::accepting(),
    )?;

    let result = harness.job().run_at(Some("yesterday"), fixed_now()).await;

    assert!(matches!(result, Err(PipelineError::InvalidInput { .. })));
    assert_eq!(harness.credentials.calls(), 0);
    Ok(())
}
