//! Role assumption through STS.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::primitives::DateTime as SmithyDateTime;
use chrono::{DateTime, Utc};
use ferry_config::RoleConfig;
use ferry_pipeline::{BoxError, CredentialProvider, Credentials, ScopedSession};
use tracing::debug;

use crate::error::AwsError;

/// Assumes the delegated role using the ambient identity.
#[derive(Debug, Clone)]
pub struct StsCredentialProvider {
    client: aws_sdk_sts::Client,
    region: String,
}

impl StsCredentialProvider {
    /// Provider over the ambient configuration; sessions are scoped to `region`.
    #[must_use]
    pub fn new(config: &SdkConfig, region: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
            region: region.into(),
        }
    }
}

#[async_trait]
impl CredentialProvider for StsCredentialProvider {
    async fn assume_role(&self, role: &RoleConfig) -> Result<ScopedSession, BoxError> {
        let output = self
            .client
            .assume_role()
            .role_arn(&role.role_arn)
            .role_session_name(&role.session_name)
            .send()
            .await
            .map_err(|err| AwsError::request("sts", "AssumeRole", err))?;
        let issued = output.credentials().ok_or(AwsError::MissingField {
            operation: "AssumeRole",
            field: "credentials",
        })?;
        let credentials = Credentials {
            access_key_id: issued.access_key_id().to_string(),
            secret_access_key: issued.secret_access_key().to_string(),
            session_token: issued.session_token().to_string(),
            expiration: expiration(issued.expiration()),
        };
        debug!(
            role = %role.role_arn,
            expires = ?credentials.expiration,
            "delegated credentials issued"
        );
        Ok(ScopedSession::new(credentials, self.region.clone()))
    }
}

fn expiration(value: &SmithyDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_converts_epoch_seconds() {
        let converted = expiration(&SmithyDateTime::from_secs(1_710_000_000));
        assert_eq!(
            converted.map(|at| at.to_rfc3339()).as_deref(),
            Some("2024-03-09T16:00:00+00:00")
        );
    }
}
