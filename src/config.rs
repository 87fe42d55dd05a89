//! Runtime configuration for the finder binaries.
//!
//! Settings live in a small `KEY=VALUE` env file (default
//! `/etc/viral-finder-env`). Every key is optional; anything missing falls
//! back to the defaults below, and a missing file simply means "all
//! defaults". The API key may also come from the `YOUTUBE_API_KEY`
//! environment variable, which wins over the file.

use anyhow::{Context, Result, anyhow};
use std::{
    env, fs,
    path::Path,
    str::FromStr,
    time::Duration,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/viral-finder-env";
pub const API_KEY_ENV: &str = "YOUTUBE_API_KEY";
pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_MAX_RESULTS: u32 = 5;
pub const DEFAULT_MAX_SUBSCRIBERS: u64 = 20_000;
pub const DEFAULT_MIN_VIRAL_RATIO: f64 = 10.0;
pub const DEFAULT_MAX_VIDEO_AGE_DAYS: i64 = 7;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_DAY_WINDOW: u32 = 7;
pub const MIN_DAY_WINDOW: u32 = 1;
pub const MAX_DAY_WINDOW: u32 = 30;
pub const DEFAULT_FINDER_HOST: &str = "127.0.0.1";
pub const DEFAULT_FINDER_PORT: u16 = 8501;

/// Raw values as they appear in the env file. `None` means "not set".
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
    pub max_results: Option<u32>,
    pub max_subscribers: Option<u64>,
    pub min_viral_ratio: Option<f64>,
    pub max_video_age_days: Option<i64>,
    pub request_timeout_secs: Option<u64>,
    pub finder_host: Option<String>,
    pub finder_port: Option<u16>,
}

/// Inclusion thresholds applied by the scoring pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub max_subscribers: u64,
    pub min_viral_ratio: f64,
    pub max_video_age_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_subscribers: DEFAULT_MAX_SUBSCRIBERS,
            min_viral_ratio: DEFAULT_MIN_VIRAL_RATIO,
            max_video_age_days: DEFAULT_MAX_VIDEO_AGE_DAYS,
        }
    }
}

impl Thresholds {
    /// Thresholds for one batch. A day window shorter than the configured
    /// freshness ceiling tightens it; a longer one only widens the search.
    pub fn with_day_window(self, day_window: u32) -> Self {
        Self {
            max_video_age_days: self.max_video_age_days.min(i64::from(day_window)),
            ..self
        }
    }
}

/// Everything a batch run needs besides the keywords themselves.
#[derive(Debug, Clone)]
pub struct FinderSettings {
    pub api_key: Option<String>,
    pub api_base_url: String,
    pub max_results: u32,
    pub thresholds: Thresholds,
    pub request_timeout: Duration,
}

impl Default for FinderSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            thresholds: Thresholds::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl FinderSettings {
    /// Returns the API key or a descriptive error for the binaries to show.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty()).ok_or_else(|| {
            anyhow!("no API key configured; set {API_KEY_ENV} or add it to {DEFAULT_CONFIG_PATH}")
        })
    }
}

/// Where the form server listens.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Fully resolved configuration shared by both binaries.
#[derive(Debug, Clone)]
pub struct FinderConfig {
    pub finder: FinderSettings,
    pub server: ServerSettings,
}

fn parse_value<T>(key: &str, value: &str, path: &Path) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("Parsing {key} from {}", path.display()))
}

pub fn read_env_config(path: &Path) -> Result<Option<EnvConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("Reading {}", path.display()))?;
    let mut cfg = EnvConfig::default();
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if let Some((key_raw, value_raw)) = trimmed.split_once('=') {
            let key = key_raw.trim();
            let value = value_raw.trim().trim_matches('"');
            if value.is_empty() {
                continue;
            }
            match key {
                "YOUTUBE_API_KEY" => cfg.api_key = Some(value.to_string()),
                "API_BASE_URL" => {
                    cfg.api_base_url = Some(value.trim_end_matches('/').to_string())
                }
                "MAX_RESULTS" => cfg.max_results = Some(parse_value(key, value, path)?),
                "MAX_SUBSCRIBERS" => cfg.max_subscribers = Some(parse_value(key, value, path)?),
                "MIN_VIRAL_RATIO" => cfg.min_viral_ratio = Some(parse_value(key, value, path)?),
                "MAX_VIDEO_AGE_DAYS" => {
                    cfg.max_video_age_days = Some(parse_value(key, value, path)?)
                }
                "REQUEST_TIMEOUT_SECS" => {
                    cfg.request_timeout_secs = Some(parse_value(key, value, path)?)
                }
                "FINDER_HOST" => cfg.finder_host = Some(value.to_string()),
                "FINDER_PORT" => cfg.finder_port = Some(parse_value(key, value, path)?),
                _ => {}
            }
        }
    }
    Ok(Some(cfg))
}

pub fn load_config_from(path: impl AsRef<Path>) -> Result<FinderConfig> {
    let path = path.as_ref();
    let cfg = read_env_config(path)?.unwrap_or_default();
    let env_key = env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty());
    Ok(resolve(cfg, env_key))
}

/// Merges file values, the environment key, and defaults.
fn resolve(cfg: EnvConfig, env_key: Option<String>) -> FinderConfig {
    let defaults = Thresholds::default();
    let thresholds = Thresholds {
        max_subscribers: cfg.max_subscribers.unwrap_or(defaults.max_subscribers),
        min_viral_ratio: cfg.min_viral_ratio.unwrap_or(defaults.min_viral_ratio),
        max_video_age_days: cfg.max_video_age_days.unwrap_or(defaults.max_video_age_days),
    };
    let finder = FinderSettings {
        api_key: env_key.or(cfg.api_key),
        api_base_url: cfg
            .api_base_url
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        max_results: cfg.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
        thresholds,
        request_timeout: Duration::from_secs(
            cfg.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        ),
    };
    let server = ServerSettings {
        host: cfg
            .finder_host
            .unwrap_or_else(|| DEFAULT_FINDER_HOST.to_string()),
        port: cfg.finder_port.unwrap_or(DEFAULT_FINDER_PORT),
    };
    FinderConfig { finder, server }
}
