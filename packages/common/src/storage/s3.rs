use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, BucketConfiguration, Region};
use tokio_util::io::StreamReader;
use tracing::info;

use crate::config::S3Config;

use super::error::StorageError;
use super::hash::ContentHash;
use super::traits::{BoxReader, ByteRange, ObjectStore, content_disposition};

/// S3-compatible object store.
///
/// Three bucket handles share one endpoint: `quick` carries the short-timeout
/// metadata operations (head, delete, presign), `transfer` carries uploads
/// under the long transfer timeout, and `stream` carries downloads with no
/// request timeout at all, because the returned reader is handed to a client
/// whose pace we do not control. Multipart chunking for large bodies is
/// handled inside the client's streaming put.
pub struct S3ObjectStore {
    quick: Box<Bucket>,
    transfer: Box<Bucket>,
    stream: Box<Bucket>,
    presign_ttl_secs: u32,
}

impl S3ObjectStore {
    /// Connect to the endpoint and make sure the bucket exists, creating it
    /// when missing.
    pub async fn connect(cfg: &S3Config) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: cfg.region.clone(),
            endpoint: cfg.endpoint.clone(),
        };
        let credentials = Credentials::new(
            Some(&cfg.access_key),
            Some(&cfg.secret_key),
            None,
            None,
            None,
        )
        .map_err(|err| StorageError::Backend(err.to_string()))?;

        let base = Bucket::new(&cfg.bucket, region.clone(), credentials.clone())
            .map_err(backend_err)?
            .with_path_style();

        if !base.exists().await.map_err(backend_err)? {
            info!(bucket = %cfg.bucket, "Bucket missing, creating it");
            Bucket::create_with_path_style(
                &cfg.bucket,
                region,
                credentials,
                BucketConfiguration::default(),
            )
            .await
            .map_err(backend_err)?;
        }

        let quick = base
            .with_request_timeout(Duration::from_secs(cfg.quick_timeout_secs))
            .map_err(backend_err)?;
        let transfer = base
            .with_request_timeout(Duration::from_secs(cfg.transfer_timeout_secs))
            .map_err(backend_err)?;

        Ok(Self {
            quick,
            transfer,
            stream: base,
            presign_ttl_secs: cfg.presign_ttl_secs,
        })
    }
}

fn backend_err(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_missing(err: &S3Error) -> bool {
    matches!(
        err,
        S3Error::HttpFailWithBody(404, _) | S3Error::HttpFail
    )
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn head(&self, hash: &ContentHash) -> Result<Option<u64>, StorageError> {
        match self.quick.head_object(hash.object_key()).await {
            Ok((head, _code)) => Ok(Some(head.content_length.unwrap_or(0).max(0) as u64)),
            Err(e) if is_missing(&e) => Ok(None),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn put(
        &self,
        hash: &ContentHash,
        mut reader: BoxReader,
        size: u64,
        mime: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .transfer
            .put_object_stream_with_content_type(&mut reader, hash.object_key(), mime)
            .await
            .map_err(backend_err)?;

        let uploaded = response.uploaded_bytes() as u64;
        if uploaded != size {
            return Err(StorageError::Backend(format!(
                "short upload for {hash}: sent {uploaded} of {size} bytes"
            )));
        }
        Ok(())
    }

    async fn get(
        &self,
        hash: &ContentHash,
        range: Option<ByteRange>,
    ) -> Result<BoxReader, StorageError> {
        let key = hash.object_key();
        match range {
            // Ranged reads are buffered; full downloads stay streaming.
            Some(ByteRange { start, end }) => {
                let response = self
                    .stream
                    .get_object_range(&key, start, end)
                    .await
                    .map_err(|e| {
                        if is_missing(&e) {
                            StorageError::NotFound(key.clone())
                        } else {
                            backend_err(e)
                        }
                    })?;
                Ok(Box::new(Cursor::new(response.bytes().to_vec())))
            }
            None => {
                let response = self.stream.get_object_stream(&key).await.map_err(|e| {
                    if is_missing(&e) {
                        StorageError::NotFound(key.clone())
                    } else {
                        backend_err(e)
                    }
                })?;
                let stream = response
                    .bytes
                    .map_err(|e| std::io::Error::other(e.to_string()));
                Ok(Box::new(StreamReader::new(stream)))
            }
        }
    }

    async fn delete(&self, hash: &ContentHash) -> Result<(), StorageError> {
        match self.quick.delete_object(hash.object_key()).await {
            Ok(_) => Ok(()),
            Err(e) if is_missing(&e) => Ok(()),
            Err(e) => Err(backend_err(e)),
        }
    }

    async fn presign_get(
        &self,
        hash: &ContentHash,
        filename: &str,
        mime: &str,
    ) -> Result<Option<String>, StorageError> {
        let queries = HashMap::from([
            (
                "response-content-disposition".to_string(),
                content_disposition(mime, filename),
            ),
            ("response-content-type".to_string(), mime.to_string()),
        ]);

        let url = self
            .quick
            .presign_get(hash.object_key(), self.presign_ttl_secs, Some(queries))
            .await
            .map_err(backend_err)?;
        Ok(Some(url))
    }
}
