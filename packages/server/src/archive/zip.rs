use std::sync::Arc;

use async_zip::{Compression, ZipEntryBuilder};
use async_zip::tokio::write::ZipFileWriter;
use common::storage::ObjectStore;
use tokio::io::DuplexStream;
use tokio_util::compat::FuturesAsyncWriteCompatExt;

use super::{ArchiveEntry, ArchiveError};

/// Write a zip stream of `entries` into the pipe. Entries are written in
/// streaming mode (sizes land in the data descriptor), so the writer never
/// seeks and never buffers a whole file.
pub(super) async fn write(
    store: Arc<dyn ObjectStore>,
    entries: Vec<ArchiveEntry>,
    out: DuplexStream,
) -> Result<(), ArchiveError> {
    let mut zip = ZipFileWriter::with_tokio(out);

    for entry in entries {
        let mut reader = store.get(&entry.hash, None).await?;

        let options = ZipEntryBuilder::new(entry.name.clone().into(), Compression::Deflate);
        let entry_writer = zip.write_entry_stream(options).await?;
        let mut entry_writer = entry_writer.compat_write();

        tokio::io::copy(&mut reader, &mut entry_writer).await?;
        entry_writer.into_inner().close().await?;
    }

    zip.close().await?;
    Ok(())
}
