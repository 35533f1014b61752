//! Worker configuration.
//!
//! [`WorkerConfig`] is built once at process start and passed by
//! reference to every stage. Nothing below the binary reads the
//! environment directly.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default `host:port` of the local render engine.
pub const DEFAULT_COMFY_HOST: &str = "127.0.0.1:8188";

/// Default directory the engine writes its outputs to.
pub const DEFAULT_OUTPUT_PATH: &str = "/comfyui/output";

const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
const DEFAULT_POLL_MAX_RETRIES: u32 = 500;
const DEFAULT_PROBE_INTERVAL_MS: u64 = 50;
const DEFAULT_PROBE_MAX_RETRIES: u32 = 500;

/// Remote object store credentials. Only constructed when every field
/// is present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Base URL of the storage service, without trailing slash.
    pub url: String,
    pub bucket: String,
    pub api_key: String,
}

/// Immutable settings for one worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// `host:port` of the render engine.
    pub engine_host: String,
    /// Delay between history polls.
    pub poll_interval: Duration,
    /// Maximum number of history polls before giving up.
    pub poll_max_retries: u32,
    /// Delay between availability probes.
    pub probe_interval: Duration,
    /// Maximum number of availability probes.
    pub probe_max_retries: u32,
    /// Fail the job when the probe budget is exhausted instead of
    /// submitting anyway.
    pub require_engine: bool,
    /// Directory the engine writes artifacts into.
    pub output_dir: PathBuf,
    pub storage: Option<StorageConfig>,
    /// Ask the hosting platform to recycle the worker after the job.
    pub refresh_worker: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            engine_host: DEFAULT_COMFY_HOST.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_max_retries: DEFAULT_POLL_MAX_RETRIES,
            probe_interval: Duration::from_millis(DEFAULT_PROBE_INTERVAL_MS),
            probe_max_retries: DEFAULT_PROBE_MAX_RETRIES,
            require_engine: false,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_PATH),
            storage: None,
            refresh_worker: false,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                           | Default            |
    /// |-----------------------------------|--------------------|
    /// | `COMFY_HOST`                      | `127.0.0.1:8188`   |
    /// | `COMFY_POLLING_INTERVAL_MS`       | `250`              |
    /// | `COMFY_POLLING_MAX_RETRIES`       | `500`              |
    /// | `COMFY_API_AVAILABLE_INTERVAL_MS` | `50`               |
    /// | `COMFY_API_AVAILABLE_MAX_RETRIES` | `500`              |
    /// | `COMFY_API_REQUIRED`              | `false`            |
    /// | `COMFY_OUTPUT_PATH`               | `/comfyui/output`  |
    /// | `REFRESH_WORKER`                  | `false`            |
    /// | `SUPABASE_URL`                    | unset              |
    /// | `SUPABASE_BUCKET`                 | unset              |
    /// | `SUPA_ROLE_TOKEN`                 | unset              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Empty values are
    /// treated the same as unset ones.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let storage = match (
            get("SUPABASE_URL"),
            get("SUPABASE_BUCKET"),
            get("SUPA_ROLE_TOKEN"),
        ) {
            (Some(url), Some(bucket), Some(api_key)) => Some(StorageConfig {
                url: url.trim_end_matches('/').to_string(),
                bucket,
                api_key,
            }),
            _ => None,
        };

        Ok(Self {
            engine_host: get("COMFY_HOST").unwrap_or(defaults.engine_host),
            poll_interval: Duration::from_millis(parse_u64(
                "COMFY_POLLING_INTERVAL_MS",
                get("COMFY_POLLING_INTERVAL_MS"),
                DEFAULT_POLL_INTERVAL_MS,
            )?),
            poll_max_retries: parse_u32(
                "COMFY_POLLING_MAX_RETRIES",
                get("COMFY_POLLING_MAX_RETRIES"),
                DEFAULT_POLL_MAX_RETRIES,
            )?,
            probe_interval: Duration::from_millis(parse_u64(
                "COMFY_API_AVAILABLE_INTERVAL_MS",
                get("COMFY_API_AVAILABLE_INTERVAL_MS"),
                DEFAULT_PROBE_INTERVAL_MS,
            )?),
            probe_max_retries: parse_u32(
                "COMFY_API_AVAILABLE_MAX_RETRIES",
                get("COMFY_API_AVAILABLE_MAX_RETRIES"),
                DEFAULT_PROBE_MAX_RETRIES,
            )?,
            require_engine: parse_bool("COMFY_API_REQUIRED", get("COMFY_API_REQUIRED"))?,
            output_dir: get("COMFY_OUTPUT_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            storage,
            refresh_worker: parse_bool("REFRESH_WORKER", get("REFRESH_WORKER"))?,
        })
    }

    /// Base HTTP URL of the render engine, e.g. `http://127.0.0.1:8188`.
    pub fn engine_url(&self) -> String {
        format!("http://{}", self.engine_host)
    }
}

fn parse_u64(var: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInteger { var, value: v }),
    }
}

fn parse_u32(var: &'static str, value: Option<String>, default: u32) -> Result<u32, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidInteger { var, value: v }),
    }
}

fn parse_bool(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(false),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(ConfigError::InvalidBool { var, value: v }),
        },
    }
}
