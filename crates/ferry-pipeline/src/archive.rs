//! Single-entry zip archives written to local scratch storage.
//!
//! # Design
//! - The source is streamed through a blocking bridge; it is never buffered whole.
//! - Completion resolves only after the zip is finished, flushed, synced, and the handle dropped.
//! - Entries carry a fixed timestamp so the same input always produces the same bytes.
//! - A failed write removes its partial archive; a source that stops yielding bytes
//!   for longer than the read timeout fails the write and releases the blocking thread.

use std::fs::File;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};
use tokio_util::io::SyncIoBridge;
use uuid::Uuid;
use tracing::{debug, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{ArchiveWarning, PipelineError, PipelineResult};
use crate::ports::{ByteStream, FetchedObject};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Finished archive on scratch storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFile {
    /// Scratch path of the archive.
    pub path: PathBuf,
    /// Uncompressed bytes read from the source.
    pub bytes_in: u64,
    /// Size of the archive on disk.
    pub archive_bytes: u64,
    /// Recoverable issues observed while archiving.
    pub warnings: Vec<ArchiveWarning>,
}

/// Writes single-entry archives below a scratch root.
#[derive(Debug, Clone)]
pub struct Archiver {
    scratch_dir: PathBuf,
    read_timeout: Duration,
}

impl Archiver {
    /// Archiver rooted at `scratch_dir`.
    #[must_use]
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Longest a source read may make no progress before the write fails.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// `<scratch_dir>/<bucket>/<key>.<record_id>.zip`.
    ///
    /// `record_id` is unique per record pipeline, so two records naming the same
    /// object in one event never share a file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidInput`] when the bucket or key contains an
    /// absolute or parent component.
    pub fn scratch_path(
        &self,
        bucket: &str,
        key: &str,
        record_id: Uuid,
    ) -> PipelineResult<PathBuf> {
        let mut path = self.scratch_dir.clone();
        path.push(sanitize_component("bucket", bucket)?);
        path.push(sanitize_component(
            "key",
            &format!("{key}.{}.zip", record_id.simple()),
        )?);
        Ok(path)
    }

    /// Stream `object` into a new archive at `path` holding one entry named `entry_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArchiveWrite`] on any IO or zip failure, a
    /// stalled source included, and [`PipelineError::Task`] if the blocking
    /// writer task dies. The partial archive is removed before returning.
    pub async fn archive(
        &self,
        object: FetchedObject,
        entry_name: &str,
        path: &Path,
    ) -> PipelineResult<ArchivedFile> {
        let mut warnings = Vec::new();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| PipelineError::archive_io("archive.create_dir", parent, source))?;
        }
        if let Some(warning) = remove_stale(path).await {
            warn!(path = %path.display(), error = %warning, "stale scratch archive left in place");
            warnings.push(warning);
        }

        let declared = object.content_length;
        let body: ByteStream = Box::new(ReadTimeout::new(object.body, self.read_timeout));
        let reader = SyncIoBridge::new(body);
        let target = path.to_path_buf();
        let entry = entry_name.to_string();
        let written = tokio::task::spawn_blocking(move || write_archive(reader, &target, &entry))
            .await
            .map_err(|source| PipelineError::Task {
                operation: "archive",
                source,
            })
            .and_then(|result| result);
        let (bytes_in, archive_bytes) = match written {
            Ok(sizes) => sizes,
            Err(err) => {
                if let Err(cleanup) = self.discard(path).await {
                    warn!(path = %path.display(), error = %cleanup, "partial scratch archive left in place");
                }
                return Err(err);
            }
        };

        if let Some(declared) = declared.filter(|declared| *declared != bytes_in) {
            let warning = ArchiveWarning::LengthMismatch {
                declared,
                observed: bytes_in,
            };
            warn!(path = %path.display(), declared, observed = bytes_in, "archived length differs from declared length");
            warnings.push(warning);
        }

        debug!(
            path = %path.display(),
            bytes_in,
            archive_bytes,
            "archive written"
        );
        Ok(ArchivedFile {
            path: path.to_path_buf(),
            bytes_in,
            archive_bytes,
            warnings,
        })
    }

    /// Remove a scratch archive.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ArchiveWrite`] if the file exists and cannot be removed.
    pub async fn discard(&self, path: &Path) -> PipelineResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(PipelineError::archive_io("archive.discard", path, err)),
        }
    }
}

/// Fails a read that stays pending for longer than `limit`.
struct ReadTimeout<R> {
    inner: R,
    limit: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl<R> ReadTimeout<R> {
    fn new(inner: R, limit: Duration) -> Self {
        Self {
            inner,
            limit,
            deadline: Box::pin(tokio::time::sleep(limit)),
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ReadTimeout<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                let next = Instant::now() + this.limit;
                this.deadline.as_mut().reset(next);
                Poll::Ready(result)
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "source stopped yielding bytes",
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

async fn remove_stale(path: &Path) -> Option<ArchiveWarning> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => None,
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => Some(ArchiveWarning::StaleScratch {
            path: path.to_path_buf(),
            detail: err.to_string(),
        }),
    }
}

fn write_archive<R: Read>(mut reader: R, path: &Path, entry: &str) -> PipelineResult<(u64, u64)> {
    let file =
        File::create(path).map_err(|source| PipelineError::archive_io("archive.create", path, source))?;
    let mut writer = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    writer
        .start_file(entry, options)
        .map_err(|source| PipelineError::archive_zip("archive.start_entry", path, source))?;
    let bytes_in = io::copy(&mut reader, &mut writer)
        .map_err(|source| PipelineError::archive_io("archive.copy", path, source))?;
    let mut file = writer
        .finish()
        .map_err(|source| PipelineError::archive_zip("archive.finish", path, source))?;
    file.flush()
        .map_err(|source| PipelineError::archive_io("archive.flush", path, source))?;
    file.sync_all()
        .map_err(|source| PipelineError::archive_io("archive.sync", path, source))?;
    let archive_bytes = file
        .metadata()
        .map_err(|source| PipelineError::archive_io("archive.metadata", path, source))?
        .len();
    drop(file);
    Ok((bytes_in, archive_bytes))
}

fn sanitize_component(field: &'static str, value: &str) -> PipelineResult<PathBuf> {
    let path = Path::new(value);
    if path.is_absolute() {
        return Err(PipelineError::invalid_input(field, "absolute_path", value));
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => return Err(PipelineError::invalid_input(field, "invalid_segment", value)),
        }
    }

    if sanitized.as_os_str().is_empty() {
        return Err(PipelineError::invalid_input(field, "empty", value));
    }
    Ok(sanitized)
}
