//! Query submission through Athena.

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_athena::Client;
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration};
use ferry_pipeline::{BoxError, QueryRequest, QueryService, QueryServiceFactory, ScopedSession};

use crate::error::AwsError;
use crate::sdk::{session_credentials, session_region};

const PROVIDER_NAME: &str = "ferry-query-role";

/// Builds Athena clients from an assumed-role session.
#[derive(Debug, Clone, Copy, Default)]
pub struct AthenaQueryFactory;

impl QueryServiceFactory for AthenaQueryFactory {
    fn query_service(&self, session: &ScopedSession) -> Arc<dyn QueryService> {
        let config = aws_sdk_athena::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(session_region(session))
            .credentials_provider(session_credentials(session, PROVIDER_NAME))
            .build();
        Arc::new(AthenaQueryService {
            client: Client::from_conf(config),
        })
    }
}

/// Starts query executions; the service deduplicates on the request token.
#[derive(Debug, Clone)]
pub struct AthenaQueryService {
    client: Client,
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, BoxError> {
        let output = self
            .client
            .start_query_execution()
            .query_string(&request.sql)
            .client_request_token(&request.client_request_token)
            .query_execution_context(
                QueryExecutionContext::builder()
                    .database(&request.database)
                    .build(),
            )
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(&request.output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(|err| AwsError::request("athena", "StartQueryExecution", err))?;
        let execution_id = output.query_execution_id().ok_or(AwsError::MissingField {
            operation: "StartQueryExecution",
            field: "query_execution_id",
        })?;
        Ok(execution_id.to_string())
    }
}
