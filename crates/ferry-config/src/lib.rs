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

//! Environment-sourced configuration for the Ferry delivery pipeline.
//!
//! Layout: `model.rs` (typed, immutable config), `loader.rs` (environment
//! lookup and assembly), `validate.rs` (value parsers), `defaults.rs`
//! (variable names and fallback values).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use model::{
    AwsSettings, DeliveryMode, FerryConfig, NamingPolicy, OutcomePolicy, QueryConfig,
    RecordSelection, RoleConfig, TransferEndpoint,
};
