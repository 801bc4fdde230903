//! Configuration and event fixtures.

use std::io::{Cursor, Read};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, TimeZone, Utc};
use ferry_config::{
    AwsSettings, DeliveryMode, FerryConfig, NamingPolicy, OutcomePolicy, QueryConfig,
    RecordSelection, RoleConfig, TransferEndpoint,
};

/// Role every fixture config assumes.
pub const TEST_ROLE_ARN: &str = "arn:aws:iam::000000000000:role/ferry-test";
/// Mirror bucket every fixture config uses.
pub const TEST_MIRROR_BUCKET: &str = "ferry-mirror";
/// Source bucket used by the trigger event helpers.
pub const TEST_SOURCE_BUCKET: &str = "ferry-source";

/// Delivery config rooted at `scratch_dir`.
#[must_use]
pub fn ferry_config(scratch_dir: &Path, delivery: DeliveryMode) -> FerryConfig {
    FerryConfig {
        transfer: TransferEndpoint {
            host: "ftp.test".into(),
            port: 21,
            user: "ferry".into(),
            password: "secret".into(),
            connect_timeout: Duration::from_secs(2),
        },
        delivery,
        role: role(),
        mirror_bucket: TEST_MIRROR_BUCKET.into(),
        naming: NamingPolicy {
            prefix: "theguardian".into(),
            key_suffix: ".csv".into(),
        },
        selection: RecordSelection::All,
        outcome_policy: OutcomePolicy::AllOrNothing,
        record_timeout: Duration::from_secs(5),
        scratch_dir: scratch_dir.to_path_buf(),
        aws: AwsSettings {
            region: "eu-west-1".into(),
            metric_namespace: "AWS/Lambda".into(),
        },
    }
}

/// Query job config.
#[must_use]
pub fn query_config() -> QueryConfig {
    QueryConfig {
        role: role(),
        output_location: "s3://ferry-query-results/".into(),
        database: "clean".into(),
        region: "eu-west-1".into(),
    }
}

fn role() -> RoleConfig {
    RoleConfig {
        role_arn: TEST_ROLE_ARN.into(),
        session_name: "ferry-test".into(),
    }
}

/// Fixed instant used as "now"; yesterday is 2024-03-14.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0)
        .single()
        .unwrap_or_default()
}

/// Name and contents of every entry in a zip archive.
///
/// # Errors
///
/// Returns an error if `bytes` is not a readable zip archive.
pub fn zip_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("open archive")?;
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).context("read entry")?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).context("read entry body")?;
        entries.push((entry.name().to_string(), contents));
    }
    Ok(entries)
}

/// Contents of the only entry of a zip archive, checking its name.
///
/// # Errors
///
/// Returns an error unless the archive holds exactly one entry called `name`.
pub fn single_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut entries = zip_entries(bytes)?;
    ensure!(entries.len() == 1, "expected one entry, found {}", entries.len());
    let (entry_name, contents) = entries.remove(0);
    ensure!(entry_name == name, "unexpected entry name {entry_name}");
    Ok(contents)
}
