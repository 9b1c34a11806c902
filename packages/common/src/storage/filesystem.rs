use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{BoxReader, ByteRange, ObjectStore};

/// Filesystem-backed object store.
///
/// Serves small single-node deployments and the integration tests, where a
/// remote bucket is unavailable. Objects live in a Git-style sharded layout:
/// `{base_path}/{first 2 hex chars}/{remaining 62 hex chars}`. Writes stage
/// into `.tmp` and land with a rename, so concurrent puts of the same content
/// never expose a partial object.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
}

impl FilesystemObjectStore {
    pub async fn new(base_path: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self { base_path })
    }

    fn object_path(&self, hash: &ContentHash) -> PathBuf {
        self.base_path
            .join(hash.shard_prefix())
            .join(hash.shard_suffix())
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn head(&self, hash: &ContentHash) -> Result<Option<u64>, StorageError> {
        match fs::metadata(self.object_path(hash)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(
        &self,
        hash: &ContentHash,
        mut reader: BoxReader,
        _size: u64,
        _mime: &str,
    ) -> Result<(), StorageError> {
        let object_path = self.object_path(hash);
        if fs::try_exists(&object_path).await? {
            // Same key means same bytes; the existing object wins.
            return Ok(());
        }

        let temp_path = self.temp_path();
        let mut temp_file = fs::File::create(&temp_path).await?;

        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    drop(temp_file);
                    let _ = fs::remove_file(&temp_path).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = temp_file.write_all(&buf[..n]).await {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(e.into());
            }
        }

        temp_file.flush().await?;
        drop(temp_file);

        if let Some(parent) = object_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &object_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn get(
        &self,
        hash: &ContentHash,
        range: Option<ByteRange>,
    ) -> Result<BoxReader, StorageError> {
        let mut file = match fs::File::open(self.object_path(hash)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(hash.to_hex()));
            }
            Err(e) => return Err(e.into()),
        };

        match range {
            None => Ok(Box::new(BufReader::new(file))),
            Some(ByteRange { start, end }) => {
                file.seek(SeekFrom::Start(start)).await?;
                let reader: BoxReader = match end {
                    Some(end) => {
                        let len = end.saturating_sub(start) + 1;
                        Box::new(BufReader::new(file).take(len))
                    }
                    None => Box::new(BufReader::new(file)),
                };
                Ok(reader)
            }
        }
    }

    async fn delete(&self, hash: &ContentHash) -> Result<(), StorageError> {
        match fs::remove_file(self.object_path(hash)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn presign_get(
        &self,
        _hash: &ContentHash,
        _filename: &str,
        _mime: &str,
    ) -> Result<Option<String>, StorageError> {
        Ok(None)
    }
}
