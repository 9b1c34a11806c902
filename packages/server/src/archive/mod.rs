//! Live archive streaming: object store reader straight into the archive
//! writer, no disk buffering. The writer task feeds one half of an in-memory
//! duplex pipe; the HTTP response streams the other half.

mod tar;
mod zip;

use std::sync::Arc;

use axum::body::Body;
use chrono::{DateTime, Utc};
use common::storage::{ContentHash, ObjectStore, StorageError};
use thiserror::Error;
use tokio::io::DuplexStream;
use tokio_util::io::ReaderStream;
use tracing::warn;

/// Pipe buffer between the archive writer and the HTTP response.
const PIPE_BUFFER: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    Zip,
}

impl ArchiveFormat {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "tar" => Some(Self::Tar),
            "zip" => Some(Self::Zip),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Tar => "application/x-tar",
            Self::Zip => "application/zip",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Tar => "tar",
            Self::Zip => "zip",
        }
    }
}

/// One file scheduled into an archive.
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub hash: ContentHash,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("archive IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip write error: {0}")]
    Zip(#[from] async_zip::error::ZipError),
    #[error("archive task error: {0}")]
    Task(String),
}

/// Stream an archive of `entries` as an HTTP body. The writer runs in its own
/// task; an entry failure truncates the stream, which the client observes as
/// a broken transfer (status and headers are long gone by then).
pub fn stream(format: ArchiveFormat, store: Arc<dyn ObjectStore>, entries: Vec<ArchiveEntry>) -> Body {
    Body::from_stream(ReaderStream::new(reader(format, store, entries)))
}

/// The readable half of the archive pipe. Split out so tests can consume the
/// archive bytes without an HTTP body.
pub fn reader(
    format: ArchiveFormat,
    store: Arc<dyn ObjectStore>,
    entries: Vec<ArchiveEntry>,
) -> DuplexStream {
    let (writer, reader) = tokio::io::duplex(PIPE_BUFFER);

    tokio::spawn(async move {
        let result = match format {
            ArchiveFormat::Tar => tar::write(store, entries, writer).await,
            ArchiveFormat::Zip => zip::write(store, entries, writer).await,
        };
        if let Err(e) = result {
            warn!(error = %e, "Archive stream aborted");
        }
    });

    reader
}
