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

//! Delivery lifecycle events for the Ferry pipeline.
//!
//! The bus wraps `tokio::broadcast` with a bounded replay ring so that a
//! late subscriber (the CLI progress printer, a test) can still read what an
//! invocation already emitted. When the channel overflows the oldest events
//! are dropped; publishers never block.

pub mod payloads;
pub mod routing;

pub use payloads::{DEFAULT_REPLAY_CAPACITY, Event, EventEnvelope, EventId};
pub use routing::{EventBus, EventStream};
