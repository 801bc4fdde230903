//! Client configuration shared by the adapters.

use std::time::SystemTime;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use ferry_pipeline::ScopedSession;

/// Load configuration from the ambient credential chain for `region`.
pub async fn ambient_config(region: &str) -> SdkConfig {
    aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(region.to_string()))
        .load()
        .await
}

/// Static credentials built from an assumed-role session.
pub(crate) fn session_credentials(
    session: &ScopedSession,
    provider_name: &'static str,
) -> aws_sdk_s3::config::Credentials {
    let credentials = session.credentials();
    aws_sdk_s3::config::Credentials::new(
        credentials.access_key_id.clone(),
        credentials.secret_access_key.clone(),
        Some(credentials.session_token.clone()),
        credentials.expiration.map(SystemTime::from),
        provider_name,
    )
}

/// Region of an assumed-role session.
pub(crate) fn session_region(session: &ScopedSession) -> Region {
    Region::new(session.region().to_string())
}
