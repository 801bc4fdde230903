//! Output renderers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use ferry_app::{QueryResponse, UploadResponse};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};

pub(crate) fn render_upload(response: &UploadResponse, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(response),
        OutputFormat::Table => {
            let mut text = String::new();
            let _ = writeln!(text, "invocation: {}", response.invocation_id);
            let _ = writeln!(text, "date: {}", response.logical_date);
            if response.delivered.is_empty() && response.failed.is_empty() {
                let _ = writeln!(text, "no eligible records");
            }
            for name in &response.delivered {
                let _ = writeln!(text, "{:<10} {name}", "DELIVERED");
            }
            for failure in &response.failed {
                let _ = writeln!(
                    text,
                    "{:<10} {} (stage: {}, error: {})",
                    "FAILED", failure.key, failure.stage, failure.error
                );
            }
            Ok(text)
        }
    }
}

pub(crate) fn render_query(response: &QueryResponse, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => to_json(response),
        OutputFormat::Table => Ok(format!(
            "execution: {}\ndate: {}\n",
            response.execution_id, response.date
        )),
    }
}

fn to_json<T: Serialize>(value: &T) -> CliResult<String> {
    let mut text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    text.push('\n');
    Ok(text)
}
