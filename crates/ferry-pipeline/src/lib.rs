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
#![allow(clippy::module_name_repetitions)]

//! Object-to-FTP delivery pipeline and the daily query job.
//!
//! Layout: `orchestrator.rs` (per-invocation fan-out and stage reporting),
//! `naming.rs` (logical date and destination names), `archive.rs` (single-entry
//! zip on scratch storage), `transfer.rs` (FTP session state machine),
//! `query.rs` (scheduled query submission), `ports.rs` (adapter traits),
//! `model/` (trigger event and outcomes), `error.rs`.

pub mod archive;
pub mod error;
pub mod model;
pub mod naming;
pub mod orchestrator;
pub mod ports;
pub mod query;
pub mod session;
pub mod transfer;

pub use archive::{ArchivedFile, Archiver};
pub use error::{ArchiveWarning, BoxError, PipelineError, PipelineResult};
pub use model::{
    Delivered, InvocationReport, Record, RecordFailure, Stage, StageStatus, TransferOutcome,
    TriggerEvent,
};
pub use naming::{DestinationName, eligible_records, logical_date};
pub use orchestrator::{Pipeline, PipelineDeps};
pub use ports::{
    ByteStream, CredentialProvider, FetchedObject, MetricsSink, MirrorUploader, ObjectFetcher,
    QueryService, QueryServiceFactory, StorageFactory, TransferClient, TransferSession,
};
pub use query::{QueryJob, QueryRequest, QuerySubmission, pageview_query, request_token};
pub use session::{Credentials, ScopedSession};
pub use transfer::{DeliverySession, SessionState};
