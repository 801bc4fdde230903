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

//! Upload function: delivers objects named by object-created notifications.

use ferry_app::{AppResult, run_upload};

/// Serve upload invocations until the runtime shuts down.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_upload().await
}
