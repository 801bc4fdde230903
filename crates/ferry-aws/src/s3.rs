//! Object fetch and mirror upload over S3 with assumed-role credentials.
//!
//! # Design
//! - Clients are built per invocation from the [`ScopedSession`], never from ambient credentials.
//! - Object bodies are streamed; nothing is buffered whole.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use ferry_pipeline::{
    BoxError, FetchedObject, MirrorUploader, ObjectFetcher, ScopedSession, StorageFactory,
};
use tracing::debug;

use crate::error::AwsError;
use crate::sdk::{session_credentials, session_region};

const PROVIDER_NAME: &str = "ferry-assumed-role";

/// Builds S3 clients from an assumed-role session.
#[derive(Debug, Clone, Copy, Default)]
pub struct S3StorageFactory;

impl S3StorageFactory {
    fn client(session: &ScopedSession) -> Client {
        let config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(session_region(session))
            .credentials_provider(session_credentials(session, PROVIDER_NAME))
            .build();
        Client::from_conf(config)
    }
}

impl StorageFactory for S3StorageFactory {
    fn fetcher(&self, session: &ScopedSession) -> Arc<dyn ObjectFetcher> {
        Arc::new(S3ObjectFetcher {
            client: Self::client(session),
        })
    }

    fn mirror(&self, session: &ScopedSession) -> Arc<dyn MirrorUploader> {
        Arc::new(S3MirrorUploader {
            client: Self::client(session),
        })
    }
}

/// Streams objects with `GetObject`.
#[derive(Debug, Clone)]
pub struct S3ObjectFetcher {
    client: Client,
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<FetchedObject, BoxError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| AwsError::request("s3", "GetObject", err))?;
        let content_length = declared_length(output.content_length());
        debug!(bucket, key, content_length = ?content_length, "object stream opened");
        Ok(FetchedObject::new(
            Box::new(Box::pin(output.body.into_async_read())),
            content_length,
        ))
    }
}

/// Writes local files with `PutObject`; an existing key is overwritten.
#[derive(Debug, Clone)]
pub struct S3MirrorUploader {
    client: Client,
}

#[async_trait]
impl MirrorUploader for S3MirrorUploader {
    async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), BoxError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| AwsError::Body {
                path: local_path.to_path_buf(),
                source: Box::new(err),
            })?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/zip")
            .body(body)
            .send()
            .await
            .map_err(|err| AwsError::request("s3", "PutObject", err))?;
        debug!(bucket, key, "mirror object written");
        Ok(())
    }
}

fn declared_length(length: Option<i64>) -> Option<u64> {
    length.and_then(|value| u64::try_from(value).ok())
}
