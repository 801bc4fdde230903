//! CLI error type separating operator mistakes from pipeline failures.

use std::fmt::{self, Display, Formatter};

use ferry_app::AppError;
use ferry_pipeline::PipelineError;

/// Distinguishes validation problems (exit 2) from operational failures (exit 3).
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl From<AppError> for CliError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Config { source, .. } => {
                Self::validation(format!("{source}: {}", source.field()))
            }
            AppError::Pipeline {
                source: PipelineError::InvalidInput { field, reason, .. },
                ..
            } => Self::validation(format!("{field}: {reason}")),
            other => Self::failure(other),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_config::ConfigError;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(CliError::validation("bad date").exit_code(), 2);
        assert_eq!(
            CliError::failure(anyhow::anyhow!("endpoint down")).exit_code(),
            3
        );
    }

    #[test]
    fn configuration_errors_are_validation_failures() {
        let err = CliError::from(AppError::Config {
            operation: "config.from_env",
            source: ConfigError::MissingEnv {
                name: "FERRY_FTP_HOST",
            },
        });
        assert_eq!(err.exit_code(), 2);
        assert_eq!(
            err.display_message(),
            "missing environment configuration: FERRY_FTP_HOST"
        );
    }

    #[test]
    fn pipeline_failures_exit_with_three() {
        let err = CliError::from(AppError::Pipeline {
            operation: "pipeline.process",
            source: PipelineError::Aggregate {
                total: 2,
                failures: Vec::new(),
            },
        });
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("one or more records failed"));
    }
}
