//! Production wiring for the Lambda functions.
//!
//! # Design
//! - Configuration is loaded once per cold start; a bad environment fails the start, not an invocation.
//! - Ambient AWS credentials serve STS and `CloudWatch`; data access uses the assumed role.

use std::sync::Arc;

use ferry_aws::{
    AthenaQueryFactory, CloudWatchMetricsSink, S3StorageFactory, StsCredentialProvider,
    ambient_config,
};
use ferry_config::{FerryConfig, QueryConfig};
use ferry_events::EventBus;
use ferry_ftp::FtpTransferClient;
use ferry_pipeline::{Pipeline, PipelineDeps, QueryJob};
use ferry_telemetry::{LoggingConfig, Metrics, ProcessContextGuard};
use lambda_runtime::service_fn;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::handler::{handle_query, handle_upload};

/// Dependencies of the upload function.
pub struct UploadDependencies {
    /// Loaded configuration.
    pub config: Arc<FerryConfig>,
    /// Event bus shared with the pipeline.
    pub events: EventBus,
    /// Metrics registry shared with the pipeline.
    pub metrics: Metrics,
    /// Pipeline wired to the AWS and FTP adapters.
    pub pipeline: Pipeline,
}

impl UploadDependencies {
    /// Construct production dependencies from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or metrics setup fails.
    pub async fn from_env() -> AppResult<Self> {
        let config = Arc::new(
            FerryConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?,
        );
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let events = EventBus::new();
        let sdk = ambient_config(&config.aws.region).await;
        let deps = PipelineDeps {
            credentials: Arc::new(StsCredentialProvider::new(&sdk, config.aws.region.clone())),
            storage: Arc::new(S3StorageFactory),
            transfer: Arc::new(FtpTransferClient),
            metrics_sink: Arc::new(CloudWatchMetricsSink::new(
                &sdk,
                config.aws.metric_namespace.clone(),
            )),
        };
        let pipeline = Pipeline::new(Arc::clone(&config), deps, events.clone(), metrics.clone());
        Ok(Self {
            config,
            events,
            metrics,
            pipeline,
        })
    }
}

/// Dependencies of the query function.
pub struct QueryDependencies {
    /// Loaded configuration.
    pub config: Arc<QueryConfig>,
    /// Metrics registry shared with the job.
    pub metrics: Metrics,
    /// Query job wired to STS and Athena.
    pub job: QueryJob,
}

impl QueryDependencies {
    /// Construct production dependencies from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration or metrics setup fails.
    pub async fn from_env() -> AppResult<Self> {
        let config = Arc::new(
            QueryConfig::from_env().map_err(|err| AppError::config("query_config.from_env", err))?,
        );
        let metrics =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        let sdk = ambient_config(&config.region).await;
        let job = QueryJob::new(
            Arc::clone(&config),
            Arc::new(StsCredentialProvider::new(&sdk, config.region.clone())),
            Arc::new(AthenaQueryFactory),
            EventBus::new(),
            metrics.clone(),
        );
        Ok(Self {
            config,
            metrics,
            job,
        })
    }
}

/// Install logging and enter the process span for `service`.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_telemetry(service: &'static str) -> AppResult<ProcessContextGuard> {
    ferry_telemetry::init_logging(&LoggingConfig::from_env())
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    Ok(ProcessContextGuard::new(service))
}

/// Boot and serve the upload function.
///
/// # Errors
///
/// Returns an error if bootstrap fails or the runtime loop exits abnormally.
pub async fn run_upload() -> AppResult<()> {
    let _context = init_telemetry("ferry-upload")?;
    let dependencies = UploadDependencies::from_env().await?;
    info!(
        delivery = dependencies.config.delivery.as_str(),
        endpoint = %dependencies.config.transfer.address(),
        "upload function ready"
    );
    let pipeline = &dependencies.pipeline;
    lambda_runtime::run(service_fn(|event| handle_upload(pipeline, event)))
        .await
        .map_err(|err| AppError::runtime("lambda.run", err))
}

/// Boot and serve the query function.
///
/// # Errors
///
/// Returns an error if bootstrap fails or the runtime loop exits abnormally.
pub async fn run_query() -> AppResult<()> {
    let _context = init_telemetry("ferry-query")?;
    let dependencies = QueryDependencies::from_env().await?;
    info!(database = %dependencies.config.database, "query function ready");
    let job = &dependencies.job;
    lambda_runtime::run(service_fn(|event| handle_query(job, event)))
        .await
        .map_err(|err| AppError::runtime("lambda.run", err))
}
