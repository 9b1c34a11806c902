use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use md5::Md5;
use sha2::{Digest, Sha256};
use sysinfo::Disks;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::WorkspaceConfig;
use crate::storage::ContentHash;

/// Errors from the scratch staging layer.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("no scratch directories configured")]
    NoScratchDirs,
    #[error("no scratch directory has {required} bytes free")]
    NoCapacity { required: u64 },
    #[error("request body exceeds the advertised {expected} bytes")]
    SizeExceeded { expected: u64 },
    #[error("scratch IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Manages the scratch directories that stage uploads on local disk.
///
/// An upload streams into a scratch file while SHA-256 and MD5 are computed on
/// the fly, so the commit decision (dedup or push to the object store) can be
/// taken once the full digest is known without holding the body in memory.
pub struct WorkspaceManager {
    dirs: Vec<ScratchDir>,
    capacity_threshold: u64,
}

struct ScratchDir {
    path: PathBuf,
    mib_per_sec: f64,
}

impl WorkspaceManager {
    /// Create the scratch directories and rank them by measured sequential
    /// write throughput, fastest first.
    pub async fn new(cfg: &WorkspaceConfig) -> Result<Self, WorkspaceError> {
        if cfg.dirs.is_empty() {
            return Err(WorkspaceError::NoScratchDirs);
        }

        let mut dirs = Vec::with_capacity(cfg.dirs.len());
        for path in &cfg.dirs {
            fs::create_dir_all(path).await?;
            let mib_per_sec = benchmark_dir(path, cfg.probe_bytes).await?;
            info!(
                dir = %path.display(),
                mib_per_sec = format!("{mib_per_sec:.0}"),
                "Benchmarked scratch directory"
            );
            dirs.push(ScratchDir {
                path: path.clone(),
                mib_per_sec,
            });
        }
        dirs.sort_by(|a, b| b.mib_per_sec.total_cmp(&a.mib_per_sec));

        Ok(Self {
            dirs,
            capacity_threshold: cfg.capacity_threshold,
        })
    }

    /// Open a scratch file for an incoming body.
    ///
    /// When the client advertised a `Content-Length`, the chosen directory must
    /// have `capacity_threshold * expected_bytes` free; the fastest qualifying
    /// directory wins.
    pub async fn acquire(&self, expected_bytes: Option<u64>) -> Result<ScratchFile, WorkspaceError> {
        let required = expected_bytes.map(|b| b.saturating_mul(self.capacity_threshold));

        for dir in &self.dirs {
            if let Some(required) = required {
                match available_space(&dir.path) {
                    Some(free) if free >= required => {}
                    Some(free) => {
                        debug!(
                            dir = %dir.path.display(),
                            free,
                            required,
                            "Scratch directory too full, trying next"
                        );
                        continue;
                    }
                    // No mount point resolved (containers); let the write
                    // itself hit disk-full if it must.
                    None => {
                        debug!(dir = %dir.path.display(), "Free space unknown, accepting");
                    }
                }
            }

            let path = dir.path.join(format!("upload-{}", uuid::Uuid::new_v4()));
            let file = fs::File::create(&path).await?;
            return Ok(ScratchFile::new(path, file, expected_bytes));
        }

        Err(WorkspaceError::NoCapacity {
            required: required.unwrap_or(0),
        })
    }

    /// Unlink scratch files older than `age`, left behind by a crashed
    /// process. Runs at startup and from the reaper.
    pub async fn clean_stale(&self, age: Duration) -> Result<u64, WorkspaceError> {
        let cutoff = SystemTime::now() - age;
        let mut removed = 0u64;

        for dir in &self.dirs {
            let mut entries = fs::read_dir(&dir.path).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let Ok(modified) = meta.modified() else {
                    continue;
                };
                if modified < cutoff && fs::remove_file(entry.path()).await.is_ok() {
                    warn!(file = %entry.path().display(), "Removed stale scratch file");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Free bytes on the filesystem holding `path`, by longest mount-point match.
fn available_space(path: &Path) -> Option<u64> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| canonical.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// Sequential write probe: MiB/s over `probe_bytes` of 64 KiB writes.
async fn benchmark_dir(dir: &Path, probe_bytes: u64) -> Result<f64, WorkspaceError> {
    let path = dir.join(format!("probe-{}", uuid::Uuid::new_v4()));
    let chunk = vec![0u8; 64 * 1024];

    let started = Instant::now();
    let result = async {
        let mut file = fs::File::create(&path).await?;
        let mut written = 0u64;
        while written < probe_bytes {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.sync_all().await?;
        Ok::<u64, std::io::Error>(written)
    }
    .await;
    let elapsed = started.elapsed();

    let _ = fs::remove_file(&path).await;
    let written = result?;

    let secs = elapsed.as_secs_f64().max(1e-6);
    Ok((written as f64 / (1024.0 * 1024.0)) / secs)
}

/// An in-progress staged upload: every written chunk is teed into both
/// digests before it reaches disk.
pub struct ScratchFile {
    path: PathBuf,
    file: Option<fs::File>,
    sha256: Sha256,
    md5: Md5,
    written: u64,
    expected: Option<u64>,
}

impl ScratchFile {
    fn new(path: PathBuf, file: fs::File, expected: Option<u64>) -> Self {
        Self {
            path,
            file: Some(file),
            sha256: Sha256::new(),
            md5: Md5::new(),
            written: 0,
            expected,
        }
    }

    /// Append a chunk. Fails with `SizeExceeded` on the first byte past the
    /// advertised length; the stream must not be retried elsewhere mid-body.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), WorkspaceError> {
        if let Some(expected) = self.expected
            && self.written + chunk.len() as u64 > expected
        {
            return Err(WorkspaceError::SizeExceeded { expected });
        }

        let Some(file) = self.file.as_mut() else {
            return Err(std::io::Error::other("scratch file already finished").into());
        };

        self.sha256.update(chunk);
        self.md5.update(chunk);
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Close the scratch file and hand over the staged bytes with their
    /// digests. The file stays on disk until the returned handle is released.
    pub async fn finish(mut self) -> Result<StagedUpload, WorkspaceError> {
        let Some(mut file) = self.file.take() else {
            return Err(std::io::Error::other("scratch file already finished").into());
        };
        file.flush().await?;
        drop(file);

        Ok(StagedUpload {
            sha256: ContentHash::from_bytes(std::mem::take(&mut self.sha256).finalize().into()),
            md5: hex::encode(std::mem::take(&mut self.md5).finalize()),
            bytes: self.written,
            path: std::mem::take(&mut self.path),
            released: false,
        })
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if self.file.is_some() {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// A fully staged body: digests, size, and the scratch path holding the bytes.
pub struct StagedUpload {
    pub sha256: ContentHash,
    /// Lowercase hex MD5 digest.
    pub md5: String,
    pub bytes: u64,
    path: PathBuf,
    released: bool,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reopen the staged bytes for reading (the object store push).
    pub async fn open(&self) -> Result<fs::File, WorkspaceError> {
        Ok(fs::File::open(&self.path).await?)
    }

    /// Unlink the scratch file. Runs on every control path; dropping the
    /// handle unlinks as well, so an early `?` cannot leak scratch space.
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if !self.released {
            if let Err(e) = std::fs::remove_file(&self.path) {
                debug!(path = %self.path.display(), error = %e, "Scratch unlink failed");
            }
            self.released = true;
        }
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        self.remove();
    }
}
