use std::path::Path;
use std::sync::Arc;

use common::storage::{BoxReader, ObjectStore};
use tokio::io::DuplexStream;
use tokio_util::io::SyncIoBridge;

use super::{ArchiveEntry, ArchiveError};

type Builder = ::tar::Builder<SyncIoBridge<DuplexStream>>;

/// Write a tar stream of `entries` into the pipe. The tar builder is
/// synchronous, so every append hops onto a blocking thread and bridges both
/// the object store reader and the pipe writer.
pub(super) async fn write(
    store: Arc<dyn ObjectStore>,
    entries: Vec<ArchiveEntry>,
    out: DuplexStream,
) -> Result<(), ArchiveError> {
    let mut builder = ::tar::Builder::new(SyncIoBridge::new(out));

    for entry in entries {
        let reader = store.get(&entry.hash, None).await?;
        builder = append(builder, entry, reader).await?;
    }

    tokio::task::spawn_blocking(move || -> Result<(), ArchiveError> {
        let mut out = builder.into_inner()?;
        std::io::Write::flush(&mut out)?;
        Ok(())
    })
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}

async fn append(
    mut builder: Builder,
    entry: ArchiveEntry,
    reader: BoxReader,
) -> Result<Builder, ArchiveError> {
    tokio::task::spawn_blocking(move || {
        let mut header = ::tar::Header::new_gnu();
        header.set_size(entry.size);
        header.set_mode(0o644);
        header.set_mtime(entry.modified.timestamp().max(0) as u64);

        let data = SyncIoBridge::new(reader);
        builder.append_data(&mut header, Path::new(&entry.name), data)?;
        Ok(builder)
    })
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}
