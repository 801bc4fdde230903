//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers built once at startup and shared read-only.
//! - Revision variants of the delivery handler are expressed as options here.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Immutable configuration for one delivery pipeline process.
#[derive(Debug, Clone)]
pub struct FerryConfig {
    /// Remote file-transfer endpoint.
    pub transfer: TransferEndpoint,
    /// Archive or passthrough delivery.
    pub delivery: DeliveryMode,
    /// Delegated role used for object storage access.
    pub role: RoleConfig,
    /// Bucket that receives the mirror copy in archive mode.
    pub mirror_bucket: String,
    /// Record filtering and destination naming rules.
    pub naming: NamingPolicy,
    /// Whether to process every eligible record or only the first.
    pub selection: RecordSelection,
    /// How record failures surface to the caller.
    pub outcome_policy: OutcomePolicy,
    /// Upper bound on a single record pipeline. Also bounds how long an archive
    /// write waits on a source that stops yielding bytes, so a timed-out record
    /// releases its blocking writer thread within one more interval.
    pub record_timeout: Duration,
    /// Root directory for local archive scratch files.
    pub scratch_dir: PathBuf,
    /// Region and metric settings for AWS clients.
    pub aws: AwsSettings,
}

/// Remote FTP endpoint and credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferEndpoint {
    /// Hostname or address of the endpoint.
    pub host: String,
    /// TCP port of the endpoint.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
    /// Upper bound on establishing the control connection.
    pub connect_timeout: Duration,
}

impl TransferEndpoint {
    /// `host:port` rendering used for logging and socket resolution.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for TransferEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Delegated role settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConfig {
    /// Role identifier (ARN).
    pub role_arn: String,
    /// Session name recorded by the identity service.
    pub session_name: String,
}

/// Key filtering and destination naming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingPolicy {
    /// Prefix of every destination name.
    pub prefix: String,
    /// Key suffix a record must carry to be processed, including the leading dot.
    pub key_suffix: String,
}

/// Region and metric settings shared by the AWS adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    /// Region for every client.
    pub region: String,
    /// `CloudWatch` namespace for payload size data.
    pub metric_namespace: String,
}

/// Configuration for the scheduled query job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Delegated role used to reach the query service.
    pub role: RoleConfig,
    /// Location the query service writes results to.
    pub output_location: String,
    /// Database the query runs against.
    pub database: String,
    /// Region for the query client.
    pub region: String,
}

/// Delivery flavour selected by the archive-mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Compress into a single-entry zip, deliver it, and mirror it.
    Archive,
    /// Stream the source object straight to the endpoint.
    Passthrough,
}

impl DeliveryMode {
    /// Map the archive-mode flag onto a delivery mode.
    #[must_use]
    pub const fn from_flag(zip: bool) -> Self {
        if zip { Self::Archive } else { Self::Passthrough }
    }

    /// Render the mode as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Passthrough => "passthrough",
        }
    }
}

/// Which eligible records of an event are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSelection {
    /// Process every eligible record concurrently.
    #[default]
    All,
    /// Process at most the first eligible record.
    First,
}

impl FromStr for RecordSelection {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "first" => Ok(Self::First),
            _ => Err(ConfigError::invalid(
                crate::defaults::ENV_RECORD_SELECTION,
                value,
                "unknown_selection",
            )),
        }
    }
}

/// How record failures are surfaced by an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// Any failed record fails the invocation with an aggregate error.
    #[default]
    AllOrNothing,
    /// Return per-record outcomes and let the caller decide.
    Partial,
}

impl FromStr for OutcomePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all_or_nothing" | "all-or-nothing" => Ok(Self::AllOrNothing),
            "partial" => Ok(Self::Partial),
            _ => Err(ConfigError::invalid(
                crate::defaults::ENV_OUTCOME_POLICY,
                value,
                "unknown_policy",
            )),
        }
    }
}
