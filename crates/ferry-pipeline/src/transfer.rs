//! Transfer session lifecycle enforced around any [`TransferSession`].
//!
//! ```text
//! Disconnected -> Connecting -> Ready -> Transferring -> Closed
//!        \______________\__________\__________\______-> Errored
//! ```
//!
//! A session carries exactly one put. The stage completes on `close`, not on
//! the put acknowledgement.

use std::io;

use ferry_config::TransferEndpoint;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};
use crate::ports::{ByteStream, TransferClient, TransferSession};

/// Lifecycle state of a delivery session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection attempted yet.
    Disconnected,
    /// Connection and login in flight.
    Connecting,
    /// Logged in and waiting for the single put.
    Ready,
    /// Put issued; waiting for close.
    Transferring,
    /// Put and close both succeeded.
    Closed,
    /// A step failed; the session is unusable.
    Errored,
}

impl SessionState {
    /// Stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Transferring => "transferring",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// One-shot delivery session owned by a single record pipeline.
pub struct DeliverySession {
    host: String,
    state: SessionState,
    session: Option<Box<dyn TransferSession>>,
    destination: Option<String>,
    bytes_written: u64,
}

impl DeliverySession {
    /// New session targeting `host`, used only for error context.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: SessionState::Disconnected,
            session: None,
            destination: None,
            bytes_written: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Connect and log in, bounded by the endpoint's connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Connection`] on network, login, or timeout
    /// failure and [`PipelineError::InvalidState`] if already connected.
    pub async fn connect(
        &mut self,
        client: &dyn TransferClient,
        endpoint: &TransferEndpoint,
    ) -> PipelineResult<()> {
        self.require(SessionState::Disconnected, "connect")?;
        self.state = SessionState::Connecting;
        match tokio::time::timeout(endpoint.connect_timeout, client.connect(endpoint)).await {
            Ok(Ok(session)) => {
                self.session = Some(session);
                self.state = SessionState::Ready;
                debug!(host = %self.host, "transfer session ready");
                Ok(())
            }
            Ok(Err(source)) => {
                self.state = SessionState::Errored;
                Err(PipelineError::Connection {
                    host: self.host.clone(),
                    source,
                })
            }
            Err(_) => {
                self.state = SessionState::Errored;
                Err(PipelineError::Connection {
                    host: self.host.clone(),
                    source: Box::new(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "connect timed out",
                    )),
                })
            }
        }
    }

    /// Write `source` under `name`. Only valid once, from `Ready`.
    ///
    /// A failed put releases the connection on a best-effort basis.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Write`] if the endpoint rejects the upload and
    /// [`PipelineError::InvalidState`] outside `Ready`.
    pub async fn put(&mut self, source: ByteStream, name: &str) -> PipelineResult<u64> {
        self.require(SessionState::Ready, "put")?;
        let Some(session) = self.session.as_mut() else {
            self.state = SessionState::Errored;
            return Err(self.invalid("put"));
        };
        self.state = SessionState::Transferring;
        self.destination = Some(name.to_string());
        match session.put(source, name).await {
            Ok(bytes) => {
                self.bytes_written = bytes;
                Ok(bytes)
            }
            Err(source) => {
                self.state = SessionState::Errored;
                self.release().await;
                Err(PipelineError::Write {
                    destination: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Log out after the put; returns the bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Write`] if the endpoint fails the close and
    /// [`PipelineError::InvalidState`] unless a put has completed.
    pub async fn close(&mut self) -> PipelineResult<u64> {
        self.require(SessionState::Transferring, "close")?;
        let Some(session) = self.session.take() else {
            self.state = SessionState::Errored;
            return Err(self.invalid("close"));
        };
        match session.close().await {
            Ok(()) => {
                self.state = SessionState::Closed;
                Ok(self.bytes_written)
            }
            Err(source) => {
                self.state = SessionState::Errored;
                Err(PipelineError::Write {
                    destination: self.destination.clone().unwrap_or_default(),
                    source,
                })
            }
        }
    }

    /// Abandon the session after an unrelated failure, closing any open connection.
    pub async fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = SessionState::Errored;
        }
        self.release().await;
    }

    async fn release(&mut self) {
        if let Some(session) = self.session.take()
            && let Err(err) = session.close().await
        {
            debug!(host = %self.host, error = %err, "closing abandoned transfer session failed");
        }
    }

    fn require(&mut self, expected: SessionState, operation: &'static str) -> PipelineResult<()> {
        if self.state == expected {
            return Ok(());
        }
        let err = self.invalid(operation);
        if !self.state.is_terminal() {
            self.state = SessionState::Errored;
        }
        Err(err)
    }

    const fn invalid(&self, operation: &'static str) -> PipelineError {
        PipelineError::InvalidState {
            operation,
            state: self.state.as_str(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct Counters {
        closes: AtomicUsize,
    }

    struct StubSession {
        fail_put: bool,
        counters: Arc<Counters>,
    }

    #[async_trait]
    impl TransferSession for StubSession {
        async fn put(&mut self, mut source: ByteStream, _name: &str) -> Result<u64, BoxError> {
            if self.fail_put {
                return Err("550 permission denied".into());
            }
            let mut buf = Vec::new();
            let read = source.read_to_end(&mut buf).await?;
            Ok(read as u64)
        }

        async fn close(self: Box<Self>) -> Result<(), BoxError> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StubClient {
        refuse: bool,
        hang: bool,
        fail_put: bool,
        counters: Arc<Counters>,
    }

    impl StubClient {
        fn new() -> Self {
            Self {
                refuse: false,
                hang: false,
                fail_put: false,
                counters: Arc::new(Counters::default()),
            }
        }
    }

    #[async_trait]
    impl TransferClient for StubClient {
        async fn connect(
            &self,
            _endpoint: &TransferEndpoint,
        ) -> Result<Box<dyn TransferSession>, BoxError> {
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
            }
            if self.refuse {
                return Err("530 login incorrect".into());
            }
            Ok(Box::new(StubSession {
                fail_put: self.fail_put,
                counters: Arc::clone(&self.counters),
            }))
        }
    }

    fn endpoint() -> TransferEndpoint {
        TransferEndpoint {
            host: "ftp.example.org".into(),
            port: 21,
            user: "nla".into(),
            password: "secret".into(),
            connect_timeout: Duration::from_millis(50),
        }
    }

    fn payload() -> ByteStream {
        Box::new(std::io::Cursor::new(b"a,b\n".to_vec()))
    }

    #[tokio::test]
    async fn happy_path_walks_every_state() -> PipelineResult<()> {
        let client = StubClient::new();
        let mut session = DeliverySession::new("ftp.example.org:21");
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect(&client, &endpoint()).await?;
        assert_eq!(session.state(), SessionState::Ready);

        assert_eq!(session.put(payload(), "out.csv").await?, 4);
        assert_eq!(session.state(), SessionState::Transferring);

        assert_eq!(session.close().await?, 4);
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(client.counters.closes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn second_put_is_rejected() -> PipelineResult<()> {
        let client = StubClient::new();
        let mut session = DeliverySession::new("ftp.example.org:21");
        session.connect(&client, &endpoint()).await?;
        session.put(payload(), "out.csv").await?;

        let err = session.put(payload(), "again.csv").await.expect_err("one put only");
        assert!(matches!(
            err,
            PipelineError::InvalidState {
                operation: "put",
                state: "transferring"
            }
        ));
        assert_eq!(session.state(), SessionState::Errored);
        Ok(())
    }

    #[tokio::test]
    async fn put_before_connect_is_rejected() {
        let mut session = DeliverySession::new("ftp.example.org:21");
        let err = session.put(payload(), "out.csv").await.expect_err("not connected");
        assert!(matches!(
            err,
            PipelineError::InvalidState {
                state: "disconnected",
                ..
            }
        ));
        let err = session.close().await.expect_err("errored");
        assert!(matches!(err, PipelineError::InvalidState { state: "errored", .. }));
    }

    #[tokio::test]
    async fn refused_login_is_a_connection_error() {
        let client = StubClient {
            refuse: true,
            ..StubClient::new()
        };
        let mut session = DeliverySession::new("ftp.example.org:21");
        let err = session
            .connect(&client, &endpoint())
            .await
            .expect_err("login refused");
        assert!(matches!(err, PipelineError::Connection { .. }));
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[tokio::test]
    async fn hanging_connect_times_out() {
        let client = StubClient {
            hang: true,
            ..StubClient::new()
        };
        let mut session = DeliverySession::new("ftp.example.org:21");
        let err = session
            .connect(&client, &endpoint())
            .await
            .expect_err("connect should time out");
        assert!(matches!(err, PipelineError::Connection { .. }));
    }

    #[tokio::test]
    async fn failed_put_releases_connection() -> PipelineResult<()> {
        let client = StubClient {
            fail_put: true,
            ..StubClient::new()
        };
        let mut session = DeliverySession::new("ftp.example.org:21");
        session.connect(&client, &endpoint()).await?;
        let err = session.put(payload(), "out.csv").await.expect_err("rejected");
        assert!(matches!(err, PipelineError::Write { ref destination, .. } if destination == "out.csv"));
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(client.counters.closes.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn abort_closes_ready_session() -> PipelineResult<()> {
        let client = StubClient::new();
        let mut session = DeliverySession::new("ftp.example.org:21");
        session.connect(&client, &endpoint()).await?;
        session.abort().await;
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(client.counters.closes.load(Ordering::SeqCst), 1);
        Ok(())
    }
}
