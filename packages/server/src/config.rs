use common::config::{StorageConfig, WorkspaceConfig};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    #[serde(default)]
    pub allow_origins: Vec<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age: u64,
}

fn default_cors_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origins: vec![],
            max_age: default_cors_max_age(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used when rendering absolute file links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub cors: CorsConfig,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8080
}
fn default_base_url() -> String {
    "http://localhost:8080".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: default_base_url(),
            cors: CorsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Bin and request-log lifecycle knobs.
#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Bin time-to-live in seconds, extended on every upload. Default: 7 days.
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,
    /// Reaper tick interval in seconds. Default: 300.
    #[serde(default = "default_lurker_interval_secs")]
    pub lurker_interval_secs: u64,
    /// Pause between object deletions within one reaper tick, in milliseconds.
    /// Default: 250.
    #[serde(default = "default_lurker_throttle_ms")]
    pub lurker_throttle_ms: u64,
    /// Days of request-log retention. Default: 7.
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u64,
}

fn default_expiration_secs() -> u64 {
    604_800
}
fn default_lurker_interval_secs() -> u64 {
    300
}
fn default_lurker_throttle_ms() -> u64 {
    250
}
fn default_log_retention_days() -> u64 {
    7
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            expiration_secs: default_expiration_secs(),
            lurker_interval_secs: default_lurker_interval_secs(),
            lurker_throttle_ms: default_lurker_throttle_ms(),
            log_retention_days: default_log_retention_days(),
        }
    }
}

/// Hard ceilings. Zero disables a limit.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct LimitConfig {
    /// Per-file download ceiling.
    #[serde(default)]
    pub file_downloads: u64,
    /// Global stored-bytes ceiling.
    #[serde(default)]
    pub storage_bytes: u64,
    /// Final filename extensions that are rejected outright.
    #[serde(default)]
    pub reject_extensions: Vec<String>,
}

/// Download gating.
#[derive(Debug, Deserialize, Clone)]
pub struct AccessConfig {
    /// Require the one-click verification cookie before downloads.
    #[serde(default)]
    pub require_verification_cookie: bool,
    #[serde(default)]
    pub expected_cookie_value: String,
    /// User-agent prefixes that bypass the cookie (CLI downloaders).
    #[serde(default = "default_cookie_user_agents")]
    pub cookie_user_agent_allowlist: Vec<String>,
    /// Require admin approval before any download from a bin.
    #[serde(default)]
    pub manual_approval: bool,
}

fn default_cookie_user_agents() -> Vec<String> {
    vec!["curl".into(), "Wget".into()]
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            require_verification_cookie: false,
            expected_cookie_value: String::new(),
            cookie_user_agent_allowlist: default_cookie_user_agents(),
            manual_approval: false,
        }
    }
}

/// Admin Basic-auth credentials. Empty credentials disable the admin surface.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AdminConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub limit: LimitConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., FILEBIN__DATABASE__URL)
            .add_source(Environment::with_prefix("FILEBIN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
