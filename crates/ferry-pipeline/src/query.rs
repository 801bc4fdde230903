//! Scheduled pageview query against the managed query service.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use ferry_config::QueryConfig;
use ferry_events::{Event, EventBus};
use ferry_telemetry::Metrics;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::naming::logical_date;
use crate::ports::{CredentialProvider, QueryServiceFactory};

/// Query ready to hand to a [`crate::ports::QueryService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// SQL text.
    pub sql: String,
    /// Database the query runs against.
    pub database: String,
    /// Location results are written to.
    pub output_location: String,
    /// Idempotency token; identical for the same database and date.
    pub client_request_token: String,
    /// Date the query covers.
    pub date: NaiveDate,
}

/// Accepted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySubmission {
    /// Execution id returned by the service.
    pub execution_id: String,
    /// Request that was submitted.
    pub request: QueryRequest,
}

/// Daily article pageview counts for `date`.
#[must_use]
pub fn pageview_query(date: NaiveDate) -> String {
    format!(
        "SELECT web_title, url_raw, pv.path AS url_path, count(1) AS pageviews, received_date
FROM   clean.pageview pv
       INNER JOIN clean.content_new c ON pv.path = c.path
       CROSS JOIN UNNEST (content_type_tag) AS A (a_type_tag)
       CROSS JOIN UNNEST (tone_tag) AS A (a_tone_tag)
WHERE  received_date = date'{date}'
AND    platform = 'NEXT_GEN'
AND    (a_type_tag = 'type/article' OR a_tone_tag = 'tone/minutebyminute')
GROUP BY 1,2,3,5
ORDER BY 4 DESC",
        date = date.format("%Y-%m-%d")
    )
}

/// Name-based token so repeated schedules for one day are deduplicated by the service.
#[must_use]
pub fn request_token(database: &str, date: NaiveDate) -> String {
    let name = format!("{database}:{}", date.format("%Y-%m-%d"));
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Builds and submits the daily query.
pub struct QueryJob {
    config: Arc<QueryConfig>,
    credentials: Arc<dyn CredentialProvider>,
    services: Arc<dyn QueryServiceFactory>,
    events: EventBus,
    metrics: Metrics,
}

impl QueryJob {
    /// Assemble a job from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<QueryConfig>,
        credentials: Arc<dyn CredentialProvider>,
        services: Arc<dyn QueryServiceFactory>,
        events: EventBus,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            credentials,
            services,
            events,
            metrics,
        }
    }

    /// Request for `date` under this job's configuration.
    #[must_use]
    pub fn build_request(&self, date: NaiveDate) -> QueryRequest {
        QueryRequest {
            sql: pageview_query(date),
            database: self.config.database.clone(),
            output_location: self.config.output_location.clone(),
            client_request_token: request_token(&self.config.database, date),
            date,
        }
    }

    /// Submit the query for yesterday or the override date.
    ///
    /// # Errors
    ///
    /// See [`QueryJob::run_at`].
    pub async fn run(&self, when: Option<&str>) -> PipelineResult<QuerySubmission> {
        self.run_at(when, Utc::now()).await
    }

    /// Submit the query relative to an explicit `now`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] for a malformed override,
    /// [`PipelineError::Authentication`] if the role cannot be assumed, and
    /// [`PipelineError::Query`] if the service refuses the query.
    pub async fn run_at(
        &self,
        when: Option<&str>,
        now: DateTime<Utc>,
    ) -> PipelineResult<QuerySubmission> {
        let result = self.submit(when, now).await;
        self.metrics.inc_query(result.is_ok());
        match &result {
            Ok(submission) => {
                info!(
                    execution_id = %submission.execution_id,
                    date = %submission.request.date,
                    database = %submission.request.database,
                    "query submitted"
                );
                let _ = self.events.publish(Event::QuerySubmitted {
                    execution_id: submission.execution_id.clone(),
                    date: submission.request.date.to_string(),
                });
            }
            Err(err) => {
                error!(error = %err, database = %self.config.database, "query submission failed");
            }
        }
        result
    }

    async fn submit(
        &self,
        when: Option<&str>,
        now: DateTime<Utc>,
    ) -> PipelineResult<QuerySubmission> {
        let date = logical_date(when, now)?;
        let request = self.build_request(date);
        let session = self
            .credentials
            .assume_role(&self.config.role)
            .await
            .map_err(|source| PipelineError::Authentication {
                role: self.config.role.role_arn.clone(),
                source,
            })?;
        let execution_id = self
            .services
            .query_service(&session)
            .start_query(&request)
            .await
            .map_err(|source| PipelineError::Query {
                database: request.database.clone(),
                source,
            })?;
        Ok(QuerySubmission {
            execution_id,
            request,
        })
    }
}
