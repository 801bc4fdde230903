//! Traits the pipeline is written against.
//!
//! # Design
//! - Every external collaborator sits behind one trait so the orchestrator can run against fakes.
//! - Ports return [`BoxError`]; the orchestrator classifies failures by stage.
//! - Storage clients are built from a [`ScopedSession`] rather than capturing credentials.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ferry_config::{RoleConfig, TransferEndpoint};
use tokio::io::AsyncRead;

use crate::error::BoxError;
use crate::query::QueryRequest;
use crate::session::ScopedSession;

/// Owned byte stream handed between stages.
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Source object body plus the length the store declared for it.
pub struct FetchedObject {
    /// Object body.
    pub body: ByteStream,
    /// Declared content length, when the store reports one.
    pub content_length: Option<u64>,
}

impl FetchedObject {
    /// Wrap a stream with an optional declared length.
    #[must_use]
    pub fn new(body: ByteStream, content_length: Option<u64>) -> Self {
        Self {
            body,
            content_length,
        }
    }
}

impl std::fmt::Debug for FetchedObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchedObject")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Exchanges the ambient identity for delegated credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Assume `role` and return a session scoped to this invocation.
    async fn assume_role(&self, role: &RoleConfig) -> Result<ScopedSession, BoxError>;
}

/// Reads source objects.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Open `bucket/key` as a stream.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, BoxError>;
}

/// Writes local files to the mirror bucket; re-uploading a key overwrites it.
#[async_trait]
pub trait MirrorUploader: Send + Sync {
    /// Upload `local_path` to `bucket/key`.
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), BoxError>;
}

/// Builds storage clients from an assumed-role session.
pub trait StorageFactory: Send + Sync {
    /// Fetcher authenticated with `session`.
    fn fetcher(&self, session: &ScopedSession) -> Arc<dyn ObjectFetcher>;
    /// Mirror uploader authenticated with `session`.
    fn mirror(&self, session: &ScopedSession) -> Arc<dyn MirrorUploader>;
}

/// Opens sessions to the remote transfer endpoint.
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Connect and log in.
    async fn connect(&self, endpoint: &TransferEndpoint) -> Result<Box<dyn TransferSession>, BoxError>;
}

/// One logged-in transfer session.
#[async_trait]
pub trait TransferSession: Send {
    /// Write `source` under `name`, returning the bytes written.
    async fn put(&mut self, source: ByteStream, name: &str) -> Result<u64, BoxError>;
    /// Log out and release the connection.
    async fn close(self: Box<Self>) -> Result<(), BoxError>;
}

/// Best-effort observability sink.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Record the size of a fetched payload.
    async fn record_payload_size(&self, key: &str, bytes: u64) -> Result<(), BoxError>;
}

/// Managed analytical query service.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Start `request` and return the execution id.
    async fn start_query(&self, request: &QueryRequest) -> Result<String, BoxError>;
}

/// Builds query clients from an assumed-role session.
pub trait QueryServiceFactory: Send + Sync {
    /// Query service authenticated with `session`.
    fn query_service(&self, session: &ScopedSession) -> Arc<dyn QueryService>;
}
