#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Query function: submits the daily pageview query on a schedule.

use ferry_app::{AppResult, run_query};

/// Serve scheduled query invocations until the runtime shuts down.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_query().await
}
