//! Blocking FTP sessions behind the async transfer ports.
//!
//! # Design
//! - One control connection per session; login and binary mode happen on connect.
//! - Each blocking step moves the stream into `spawn_blocking` and back.

use std::net::{SocketAddr, ToSocketAddrs};

use async_trait::async_trait;
use ferry_config::TransferEndpoint;
use ferry_pipeline::{BoxError, ByteStream, TransferClient, TransferSession};
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tokio::task::spawn_blocking;
use tokio_util::io::SyncIoBridge;
use tracing::debug;

use crate::error::{FtpError, FtpResult};

/// Opens authenticated binary-mode FTP sessions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpTransferClient;

#[async_trait]
impl TransferClient for FtpTransferClient {
    async fn connect(
        &self,
        endpoint: &TransferEndpoint,
    ) -> Result<Box<dyn TransferSession>, BoxError> {
        let endpoint = endpoint.clone();
        let stream = spawn_blocking(move || open(&endpoint))
            .await
            .map_err(|err| FtpError::task("connect", err))??;
        Ok(Box::new(FtpSession {
            stream: Some(stream),
        }))
    }
}

fn resolve(address: &str) -> FtpResult<SocketAddr> {
    address
        .to_socket_addrs()
        .map_err(|source| FtpError::Resolve {
            address: address.to_string(),
            source: Some(source),
        })?
        .next()
        .ok_or_else(|| FtpError::Resolve {
            address: address.to_string(),
            source: None,
        })
}

fn open(endpoint: &TransferEndpoint) -> FtpResult<FtpStream> {
    let address = resolve(&endpoint.address())?;
    let mut stream = FtpStream::connect_timeout(address, endpoint.connect_timeout)
        .map_err(|err| FtpError::protocol("connect", err))?;
    stream
        .login(&endpoint.user, &endpoint.password)
        .map_err(|err| FtpError::protocol("login", err))?;
    stream
        .transfer_type(FileType::Binary)
        .map_err(|err| FtpError::protocol("transfer_type", err))?;
    debug!(address = %address, user = %endpoint.user, "ftp login accepted");
    Ok(stream)
}

struct FtpSession {
    stream: Option<FtpStream>,
}

#[async_trait]
impl TransferSession for FtpSession {
    async fn put(&mut self, source: ByteStream, name: &str) -> Result<u64, BoxError> {
        let mut stream = self.stream.take().ok_or(FtpError::Closed)?;
        let mut reader = SyncIoBridge::new(source);
        let name = name.to_string();
        let (stream, written) = spawn_blocking(move || {
            let written = stream.put_file(&name, &mut reader);
            (stream, written)
        })
        .await
        .map_err(|err| FtpError::task("put", err))?;
        self.stream = Some(stream);
        let written = written.map_err(|err| FtpError::protocol("put", err))?;
        debug!(bytes = written, "ftp upload finished");
        Ok(written)
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        let Some(mut stream) = self.stream else {
            return Ok(());
        };
        spawn_blocking(move || stream.quit())
            .await
            .map_err(|err| FtpError::task("quit", err))?
            .map_err(|err| FtpError::protocol("quit", err))?;
        Ok(())
    }
}
