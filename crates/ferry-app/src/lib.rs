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

//! Lambda entrypoints for Ferry.
//!
//! Layout: `bootstrap.rs` (environment wiring and runtime loops), `handler.rs`
//! (payload translation), `error.rs`.

/// Application bootstrap and environment loading.
pub mod bootstrap;
/// Application error types.
pub mod error;
/// Lambda handlers.
pub mod handler;

pub use bootstrap::{QueryDependencies, UploadDependencies, run_query, run_upload};
pub use error::{AppError, AppResult};
pub use handler::{
    FailedRecord, QueryResponse, ScheduledEvent, UploadResponse, deliver, handle_query,
    handle_upload, submit,
};
