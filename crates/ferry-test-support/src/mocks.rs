//! In-memory adapters for the pipeline ports.
//!
//! Every fake records what it was asked to do and can be told to fail, so
//! suites assert on observable effects instead of mock expectations.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use ferry_config::{RoleConfig, TransferEndpoint};
use ferry_pipeline::{
    BoxError, ByteStream, CredentialProvider, Credentials, FetchedObject, MetricsSink,
    MirrorUploader, ObjectFetcher, QueryRequest, QueryService, QueryServiceFactory, ScopedSession,
    StorageFactory, TransferClient, TransferSession,
};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn denied(message: &str) -> BoxError {
    Box::new(io::Error::new(io::ErrorKind::PermissionDenied, message.to_string()))
}

/// Credential provider that counts role assumptions.
#[derive(Debug, Default)]
pub struct CountingCredentials {
    calls: AtomicUsize,
    deny: bool,
}

impl CountingCredentials {
    /// Provider that always grants the role.
    #[must_use]
    pub fn granting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Provider that always refuses the role.
    #[must_use]
    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            deny: true,
        })
    }

    /// Number of role assumptions attempted.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn assume_role(&self, role: &RoleConfig) -> Result<ScopedSession, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(denied("not authorized to assume role"));
        }
        Ok(ScopedSession::new(
            Credentials {
                access_key_id: format!("AKIA{}", role.session_name.to_ascii_uppercase()),
                secret_access_key: "test-secret".into(),
                session_token: "test-token".into(),
                expiration: None,
            },
            "eu-west-1",
        ))
    }
}

#[derive(Debug, Default)]
struct StoreState {
    objects: HashMap<(String, String), Vec<u8>>,
    declared: HashMap<String, u64>,
    stalled: HashSet<String>,
    reset_after: HashMap<String, usize>,
    mirrored: HashMap<(String, String), Vec<u8>>,
    mirror_writes: usize,
    fail_mirror: bool,
    clients_built: usize,
}

/// Object store plus mirror bucket held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStorage {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object.
    pub fn put_object(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        lock(&self.state)
            .objects
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    /// Report `length` as the declared content length of `key` instead of its real size.
    pub fn declare_length(&self, key: &str, length: u64) {
        lock(&self.state).declared.insert(key.to_string(), length);
    }

    /// Make fetches of `key` hang until the caller gives up.
    pub fn stall(&self, key: &str) {
        lock(&self.state).stalled.insert(key.to_string());
    }

    /// Serve the first `bytes` of `key`, then fail the body with a connection reset.
    pub fn reset_after(&self, key: &str, bytes: usize) {
        lock(&self.state).reset_after.insert(key.to_string(), bytes);
    }

    /// Make every mirror upload fail.
    pub fn fail_mirror(&self) {
        lock(&self.state).fail_mirror = true;
    }

    /// Bytes held in the mirror bucket under `key`.
    #[must_use]
    pub fn mirrored(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.state)
            .mirrored
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of objects in the mirror bucket.
    #[must_use]
    pub fn mirror_len(&self) -> usize {
        lock(&self.state).mirrored.len()
    }

    /// Number of successful mirror writes, overwrites included.
    #[must_use]
    pub fn mirror_writes(&self) -> usize {
        lock(&self.state).mirror_writes
    }

    /// Number of fetcher and mirror clients built from sessions.
    #[must_use]
    pub fn clients_built(&self) -> usize {
        lock(&self.state).clients_built
    }
}

impl StorageFactory for MemoryStorage {
    fn fetcher(&self, _session: &ScopedSession) -> Arc<dyn ObjectFetcher> {
        lock(&self.state).clients_built += 1;
        Arc::new(self.clone())
    }

    fn mirror(&self, _session: &ScopedSession) -> Arc<dyn MirrorUploader> {
        lock(&self.state).clients_built += 1;
        Arc::new(self.clone())
    }
}

#[async_trait]
impl ObjectFetcher for MemoryStorage {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, BoxError> {
        let (body, declared, stalled, reset_after) = {
            let state = lock(&self.state);
            (
                state
                    .objects
                    .get(&(bucket.to_string(), key.to_string()))
                    .cloned(),
                state.declared.get(key).copied(),
                state.stalled.contains(key),
                state.reset_after.get(key).copied(),
            )
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        let body = body.ok_or_else(|| -> BoxError {
            Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such key: {bucket}/{key}"),
            ))
        })?;
        let length = declared.unwrap_or(body.len() as u64);
        let stream: ByteStream = match reset_after {
            Some(served) => {
                let head = body[..served.min(body.len())].to_vec();
                Box::new(io::Cursor::new(head).chain(ResetBody))
            }
            None => Box::new(io::Cursor::new(body)),
        };
        Ok(FetchedObject::new(stream, Some(length)))
    }
}

/// Body that fails as soon as it is read.
struct ResetBody;

impl AsyncRead for ResetBody {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset by peer",
        )))
    }
}

#[async_trait]
impl MirrorUploader for MemoryStorage {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), BoxError> {
        if lock(&self.state).fail_mirror {
            return Err(denied("mirror bucket refused the write"));
        }
        let bytes = tokio::fs::read(local_path).await?;
        let mut state = lock(&self.state);
        state
            .mirrored
            .insert((bucket.to_string(), key.to_string()), bytes);
        state.mirror_writes += 1;
        Ok(())
    }
}

/// File written to the fake transfer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedUpload {
    /// Remote file name.
    pub name: String,
    /// Bytes received.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct TransferState {
    uploads: Vec<CapturedUpload>,
    connections: usize,
    closed: usize,
    refuse_login: bool,
    fail_puts: bool,
    connect_delay: Option<Duration>,
}

/// Transfer endpoint that captures every upload.
#[derive(Debug, Clone, Default)]
pub struct CapturingTransfer {
    state: Arc<Mutex<TransferState>>,
}

impl CapturingTransfer {
    /// Endpoint that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every login.
    pub fn refuse_login(&self) {
        lock(&self.state).refuse_login = true;
    }

    /// Fail every upload after reading the source.
    pub fn fail_puts(&self) {
        lock(&self.state).fail_puts = true;
    }

    /// Delay every connection attempt.
    pub fn delay_connect(&self, delay: Duration) {
        lock(&self.state).connect_delay = Some(delay);
    }

    /// Completed uploads in arrival order.
    #[must_use]
    pub fn uploads(&self) -> Vec<CapturedUpload> {
        lock(&self.state).uploads.clone()
    }

    /// Number of successful logins.
    #[must_use]
    pub fn connections(&self) -> usize {
        lock(&self.state).connections
    }

    /// Number of sessions closed, whether after a put or on abort.
    #[must_use]
    pub fn closed(&self) -> usize {
        lock(&self.state).closed
    }
}

#[async_trait]
impl TransferClient for CapturingTransfer {
    async fn connect(
        &self,
        endpoint: &TransferEndpoint,
    ) -> Result<Box<dyn TransferSession>, BoxError> {
        let delay = lock(&self.state).connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = lock(&self.state);
        if state.refuse_login {
            return Err(denied(&format!("530 login incorrect for {}", endpoint.user)));
        }
        state.connections += 1;
        Ok(Box::new(CapturingSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct CapturingSession {
    state: Arc<Mutex<TransferState>>,
}

#[async_trait]
impl TransferSession for CapturingSession {
    async fn put(&mut self, mut source: ByteStream, name: &str) -> Result<u64, BoxError> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes).await?;
        let mut state = lock(&self.state);
        if state.fail_puts {
            return Err(denied("553 could not create file"));
        }
        let written = bytes.len() as u64;
        state.uploads.push(CapturedUpload {
            name: name.to_string(),
            bytes,
        });
        Ok(written)
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        lock(&self.state).closed += 1;
        Ok(())
    }
}

/// Metrics sink that keeps every sample.
#[derive(Debug, Default)]
pub struct RecordingMetricsSink {
    samples: Mutex<Vec<(String, u64)>>,
    fail: bool,
}

impl RecordingMetricsSink {
    /// Sink that accepts every sample.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Sink that rejects every sample.
    #[must_use]
    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            samples: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    /// Samples accepted so far.
    #[must_use]
    pub fn samples(&self) -> Vec<(String, u64)> {
        lock(&self.samples).clone()
    }
}

#[async_trait]
impl MetricsSink for RecordingMetricsSink {
    async fn record_payload_size(&self, key: &str, bytes: u64) -> Result<(), BoxError> {
        if self.fail {
            return Err(denied("metric service unavailable"));
        }
        lock(&self.samples).push((key.to_string(), bytes));
        Ok(())
    }
}

/// Query service that records submissions.
#[derive(Debug, Default)]
pub struct FakeQueryService {
    requests: Mutex<Vec<QueryRequest>>,
    sessions: AtomicUsize,
    refuse: bool,
}

impl FakeQueryService {
    /// Service that accepts every query.
    #[must_use]
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Service that refuses every query.
    #[must_use]
    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            sessions: AtomicUsize::new(0),
            refuse: true,
        })
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<QueryRequest> {
        lock(&self.requests).clone()
    }

    /// Number of clients built from sessions.
    #[must_use]
    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryService for FakeQueryService {
    async fn start_query(&self, request: &QueryRequest) -> Result<String, BoxError> {
        if self.refuse {
            return Err(denied("query rejected"));
        }
        lock(&self.requests).push(request.clone());
        Ok(format!("exec-{}", request.client_request_token))
    }
}

/// Factory handing out the same [`FakeQueryService`].
#[derive(Debug, Clone)]
pub struct FakeQueryFactory {
    service: Arc<FakeQueryService>,
}

impl FakeQueryFactory {
    /// Factory over `service`.
    #[must_use]
    pub const fn new(service: Arc<FakeQueryService>) -> Self {
        Self { service }
    }
}

impl QueryServiceFactory for FakeQueryFactory {
    fn query_service(&self, _session: &ScopedSession) -> Arc<dyn QueryService> {
        self.service.sessions.fetch_add(1, Ordering::SeqCst);
        Arc::clone(&self.service) as Arc<dyn QueryService>
    }
}
