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

//! FTP transfer client for the Ferry pipeline.
//!
//! The control connection is a blocking `suppaftp` stream driven on the
//! blocking pool; async sources reach it through `SyncIoBridge`.

pub mod client;
pub mod error;

pub use client::FtpTransferClient;
pub use error::{FtpError, FtpResult};
