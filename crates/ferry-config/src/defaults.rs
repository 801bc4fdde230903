//! Environment variable names and fallback values.
//!
//! # Design
//! - Centralize variable names so the loader, CLI help, and docs agree.
//! - Keep time-based defaults explicit for auditability.

/// FTP host, optionally with a `:port` suffix.
pub const ENV_FTP_HOST: &str = "FERRY_FTP_HOST";
/// FTP port override.
pub const ENV_FTP_PORT: &str = "FERRY_FTP_PORT";
/// FTP user.
pub const ENV_FTP_USER: &str = "FERRY_FTP_USER";
/// FTP password.
pub const ENV_FTP_PASSWORD: &str = "FERRY_FTP_PASSWORD";
/// Archive mode flag.
pub const ENV_ZIP_FILE: &str = "FERRY_ZIP_FILE";
/// Delegated role identifier.
pub const ENV_ROLE_ARN: &str = "FERRY_ROLE_ARN";
/// Session name used when assuming the delegated role.
pub const ENV_ROLE_SESSION_NAME: &str = "FERRY_ROLE_SESSION_NAME";
/// Mirror bucket name.
pub const ENV_DESTINATION_BUCKET: &str = "FERRY_DESTINATION_BUCKET";
/// Destination file prefix.
pub const ENV_FILE_PREFIX: &str = "FERRY_FILE_PREFIX";
/// Eligible object key suffix.
pub const ENV_KEY_SUFFIX: &str = "FERRY_KEY_SUFFIX";
/// Record selection (`all` or `first`).
pub const ENV_RECORD_SELECTION: &str = "FERRY_RECORD_SELECTION";
/// Outcome policy (`all_or_nothing` or `partial`).
pub const ENV_OUTCOME_POLICY: &str = "FERRY_OUTCOME_POLICY";
/// Per-record timeout in seconds.
pub const ENV_RECORD_TIMEOUT_SECS: &str = "FERRY_RECORD_TIMEOUT_SECS";
/// FTP connect timeout in seconds.
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "FERRY_CONNECT_TIMEOUT_SECS";
/// Scratch directory for archives.
pub const ENV_SCRATCH_DIR: &str = "FERRY_SCRATCH_DIR";
/// AWS region for every client.
pub const ENV_AWS_REGION: &str = "FERRY_AWS_REGION";
/// `CloudWatch` namespace for the payload size datum.
pub const ENV_METRIC_NAMESPACE: &str = "FERRY_METRIC_NAMESPACE";
/// Query output location.
pub const ENV_QUERY_OUTPUT: &str = "FERRY_QUERY_OUTPUT";
/// Query database.
pub const ENV_QUERY_DATABASE: &str = "FERRY_QUERY_DATABASE";

pub(crate) const DEFAULT_FTP_PORT: u16 = 21;
pub(crate) const DEFAULT_FILE_PREFIX: &str = "theguardian";
pub(crate) const DEFAULT_KEY_SUFFIX: &str = ".csv";
pub(crate) const DEFAULT_ROLE_SESSION_NAME: &str = "ferry";
pub(crate) const DEFAULT_RECORD_TIMEOUT_SECS: u64 = 300;
pub(crate) const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub(crate) const DEFAULT_SCRATCH_DIR: &str = "/tmp/ferry";
pub(crate) const DEFAULT_AWS_REGION: &str = "eu-west-1";
pub(crate) const DEFAULT_METRIC_NAMESPACE: &str = "AWS/Lambda";
