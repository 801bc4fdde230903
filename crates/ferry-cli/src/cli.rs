//! Argument parsing and command dispatch for the `ferry` binary.

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use ferry_app::{
    QueryDependencies, ScheduledEvent, UploadDependencies, UploadResponse, deliver, submit,
};
use ferry_pipeline::TriggerEvent;
use ferry_telemetry::{LoggingConfig, Metrics, ProcessContextGuard};
use tracing::info;

use crate::error::{CliError, CliResult};
use crate::output::{render_query, render_upload};

/// Parses CLI arguments, executes the requested command, and returns the
/// process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let _context = init_telemetry(cli.verbose)?;
    let (text, metrics, outcome) = match cli.command {
        Command::Deliver(args) => {
            let dependencies = UploadDependencies::from_env().await?;
            let event = args.event();
            info!(
                bucket = %args.bucket,
                key = %args.key,
                when = ?event.when,
                "delivering object"
            );
            let response = deliver(&dependencies.pipeline, &event).await?;
            (
                render_upload(&response, cli.output)?,
                dependencies.metrics,
                upload_outcome(&response),
            )
        }
        Command::Query(args) => {
            let dependencies = QueryDependencies::from_env().await?;
            let response = submit(&dependencies.job, &args.event()).await?;
            (
                render_query(&response, cli.output)?,
                dependencies.metrics,
                Ok(()),
            )
        }
    };
    print!("{text}");
    if cli.print_metrics {
        print!("{}", render_metrics(&metrics)?);
    }
    outcome
}

/// Records skipped under the partial policy still fail the process.
fn upload_outcome(response: &UploadResponse) -> CliResult<()> {
    if response.failed.is_empty() {
        return Ok(());
    }
    let total = response.delivered.len() + response.failed.len();
    Err(CliError::failure(anyhow!(
        "{} of {total} records failed",
        response.failed.len()
    )))
}

fn init_telemetry(verbose: bool) -> CliResult<ProcessContextGuard> {
    let config = LoggingConfig {
        level: if verbose { "debug" } else { "warn" },
        ..LoggingConfig::from_env()
    };
    ferry_telemetry::init_logging(&config).map_err(CliError::failure)?;
    Ok(ProcessContextGuard::new("ferry-cli"))
}

fn render_metrics(metrics: &Metrics) -> CliResult<String> {
    metrics.render().map_err(CliError::failure)
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("expected YYYY-MM-DD, got `{raw}`"))
}

fn date_override(date: Option<NaiveDate>) -> Option<String> {
    date.map(|date| date.format("%Y-%m-%d").to_string())
}

#[derive(Parser)]
#[command(name = "ferry", about = "Run Ferry deliveries and queries from a shell")]
struct Cli {
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for command results"
    )]
    output: OutputFormat,
    #[arg(
        long,
        global = true,
        help = "Print the Prometheus metrics gathered during the run"
    )]
    print_metrics: bool,
    #[arg(short, long, global = true, help = "Log at debug level")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Deliver one source object as if a notification had named it.
    Deliver(DeliverArgs),
    /// Submit the daily pageview query.
    Query(QueryArgs),
}

#[derive(Args)]
struct DeliverArgs {
    #[arg(help = "Source bucket")]
    bucket: String,
    #[arg(help = "Source object key")]
    key: String,
    #[arg(long, value_parser = parse_date, help = "Logical date (YYYY-MM-DD), defaults to yesterday")]
    date: Option<NaiveDate>,
}

impl DeliverArgs {
    fn event(&self) -> TriggerEvent {
        let event = TriggerEvent::single(self.bucket.clone(), self.key.clone());
        match date_override(self.date) {
            Some(when) => event.with_when(when),
            None => event,
        }
    }
}

#[derive(Args)]
struct QueryArgs {
    #[arg(long, value_parser = parse_date, help = "Query date (YYYY-MM-DD), defaults to yesterday")]
    date: Option<NaiveDate>,
}

impl QueryArgs {
    fn event(&self) -> ScheduledEvent {
        ScheduledEvent {
            when: date_override(self.date),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub(crate) enum OutputFormat {
    Table,
    Json,
}
