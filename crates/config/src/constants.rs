//! Fixed names and defaults shared by the CLI and the pipeline

/// Directory name used under the platform config and data directories
pub const APP_DIR: &str = "ferry";

pub const CONFIG_FILE: &str = "config.toml";

/// Upstream used when neither the config nor the index `config.json` names one
pub const DEFAULT_DOWNLOAD_URL: &str = "https://crates.io/api/v1/crates";

pub const DEFAULT_WORKERS: usize = 32;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

pub const ENV_WORKERS: &str = "FERRY_WORKERS";
pub const ENV_QUEUE_CAPACITY: &str = "FERRY_QUEUE_CAPACITY";
pub const ENV_INDEX: &str = "FERRY_INDEX";
pub const ENV_ARCHIVES: &str = "FERRY_ARCHIVES";
pub const ENV_STATE_DIR: &str = "FERRY_STATE_DIR";
pub const ENV_DOWNLOAD_URL: &str = "FERRY_DOWNLOAD_URL";
