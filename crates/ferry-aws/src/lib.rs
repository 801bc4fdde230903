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

//! AWS adapters for the Ferry pipeline ports.
//!
//! Layout: `sdk.rs` (ambient and assumed-role client configuration), `sts.rs`
//! (role assumption), `s3.rs` (object fetch and mirror upload), `cloudwatch.rs`
//! (payload size datum), `athena.rs` (query submission), `error.rs`.

pub mod athena;
pub mod cloudwatch;
pub mod error;
pub mod s3;
pub mod sdk;
pub mod sts;

pub use athena::{AthenaQueryFactory, AthenaQueryService};
pub use cloudwatch::CloudWatchMetricsSink;
pub use error::{AwsError, AwsResult};
pub use s3::{S3MirrorUploader, S3ObjectFetcher, S3StorageFactory};
pub use sdk::ambient_config;
pub use sts::StsCredentialProvider;
