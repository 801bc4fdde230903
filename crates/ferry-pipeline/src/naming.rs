//! Logical dates, destination names, and record eligibility.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use ferry_config::{NamingPolicy, RecordSelection};
use regex::Regex;

use crate::error::{PipelineError, PipelineResult};
use crate::model::{Record, TriggerEvent};

const OVERRIDE_PATTERN: &str = r"^\d{4}-\d{2}-\d{2}$";
const OVERRIDE_FIELD: &str = "When";

/// Resolve the date destination names are derived from.
///
/// A blank override counts as absent. Without an override the date is the
/// UTC day before `now`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidInput`] when the override is not a real
/// `YYYY-MM-DD` calendar date.
pub fn logical_date(when: Option<&str>, now: DateTime<Utc>) -> PipelineResult<NaiveDate> {
    match when.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_override(value),
        None => now
            .date_naive()
            .checked_sub_days(Days::new(1))
            .ok_or_else(|| PipelineError::invalid_input("now", "date_underflow", &now.to_rfc3339())),
    }
}

fn parse_override(value: &str) -> PipelineResult<NaiveDate> {
    let pattern = Regex::new(OVERRIDE_PATTERN).map_err(|_| PipelineError::InvalidInput {
        field: OVERRIDE_FIELD,
        reason: "pattern_compile",
        value: None,
    })?;
    if !pattern.is_match(value) {
        return Err(PipelineError::invalid_input(
            OVERRIDE_FIELD,
            "not_yyyy_mm_dd",
            value,
        ));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| PipelineError::invalid_input(OVERRIDE_FIELD, "not_a_calendar_date", value))
}

/// `<prefix>_<YYYYMMDD>` stem shared by every file an invocation writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DestinationName {
    stem: String,
}

impl DestinationName {
    /// Derive the stem for `prefix` and `date`.
    #[must_use]
    pub fn new(prefix: &str, date: NaiveDate) -> Self {
        Self {
            stem: format!("{prefix}_{}", date.format("%Y%m%d")),
        }
    }

    /// Stem without extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Name of the delivered archive.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.stem)
    }

    /// Name carrying `suffix`, used for the archive entry and passthrough file.
    #[must_use]
    pub fn with_suffix(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.stem)
    }
}

impl fmt::Display for DestinationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem)
    }
}

/// Records whose key carries the configured suffix, truncated per `selection`.
#[must_use]
pub fn eligible_records(
    event: &TriggerEvent,
    naming: &NamingPolicy,
    selection: RecordSelection,
) -> Vec<Record> {
    let suffix = naming.key_suffix.to_ascii_lowercase();
    let matching = event
        .records
        .iter()
        .filter(|record| record.key.to_ascii_lowercase().ends_with(&suffix))
        .cloned();
    match selection {
        RecordSelection::All => matching.collect(),
        RecordSelection::First => matching.take(1).collect(),
    }
}
