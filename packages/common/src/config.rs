use std::path::PathBuf;

use serde::Deserialize;

/// Which object store backend to run against.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Filesystem,
}

/// Object storage configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Backend selection. Default: "s3".
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
}

fn default_backend() -> StorageBackend {
    StorageBackend::S3
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            s3: S3Config::default(),
            filesystem: FilesystemConfig::default(),
        }
    }
}

/// S3-compatible endpoint configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct S3Config {
    /// Endpoint URL, e.g. "http://localhost:9000".
    #[serde(default = "default_s3_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_s3_region")]
    pub region: String,
    #[serde(default = "default_s3_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Timeout for metadata operations (head, delete). Default: 30 s.
    #[serde(default = "default_quick_timeout_secs")]
    pub quick_timeout_secs: u64,
    /// Timeout for transfers (put, get). Default: 600 s; large uploads push
    /// this up.
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
    /// Presigned URL lifetime. Default: 60 s.
    #[serde(default = "default_presign_ttl_secs")]
    pub presign_ttl_secs: u32,
}

fn default_s3_endpoint() -> String {
    "http://localhost:9000".into()
}
fn default_s3_region() -> String {
    "us-east-1".into()
}
fn default_s3_bucket() -> String {
    "filebin".into()
}
fn default_quick_timeout_secs() -> u64 {
    30
}
fn default_transfer_timeout_secs() -> u64 {
    600
}
fn default_presign_ttl_secs() -> u32 {
    60
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            endpoint: default_s3_endpoint(),
            region: default_s3_region(),
            bucket: default_s3_bucket(),
            access_key: String::new(),
            secret_key: String::new(),
            quick_timeout_secs: default_quick_timeout_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
            presign_ttl_secs: default_presign_ttl_secs(),
        }
    }
}

/// Filesystem backend configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemConfig {
    #[serde(default = "default_filesystem_root")]
    pub root: PathBuf,
}

fn default_filesystem_root() -> PathBuf {
    std::env::temp_dir().join("filebin-objects")
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            root: default_filesystem_root(),
        }
    }
}

/// Scratch staging configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    /// Scratch directories, benchmarked and ranked at startup.
    #[serde(default = "default_workspace_dirs")]
    pub dirs: Vec<PathBuf>,
    /// Free space required to accept an upload, as a multiple of the
    /// advertised body size. Default: 4.
    #[serde(default = "default_capacity_threshold")]
    pub capacity_threshold: u64,
    /// Bytes written by the startup throughput probe. Default: 8 MiB.
    #[serde(default = "default_probe_bytes")]
    pub probe_bytes: u64,
    /// Age after which leftover scratch files are reclaimed. Default: 24 h.
    #[serde(default = "default_stale_age_hours")]
    pub stale_age_hours: u64,
}

fn default_workspace_dirs() -> Vec<PathBuf> {
    vec![std::env::temp_dir().join("filebin")]
}
fn default_capacity_threshold() -> u64 {
    4
}
fn default_probe_bytes() -> u64 {
    8 * 1024 * 1024
}
fn default_stale_age_hours() -> u64 {
    24
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dirs: default_workspace_dirs(),
            capacity_threshold: default_capacity_threshold(),
            probe_bytes: default_probe_bytes(),
            stale_age_hours: default_stale_age_hours(),
        }
    }
}
