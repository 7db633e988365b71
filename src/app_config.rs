use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Language translations are produced in (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Language searched when no target track exists (ISO)
    #[serde(default = "default_fallback_language")]
    pub fallback_language: String,

    /// Directory holding translated tracks
    #[serde(default = "default_subtitles_dir")]
    pub subtitles_dir: String,

    /// Port the track files are served on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public base URL of the served tracks, derived from `port` if unset
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Translation backend config
    #[serde(default)]
    pub backend: BackendConfig,

    /// Subtitle search config
    #[serde(default)]
    pub search: SearchConfig,

    /// Translation job config
    #[serde(default)]
    pub job: JobConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Ollama backend configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    // @field: Service URL
    #[serde(default = "default_ollama_endpoint")]
    pub endpoint: String,

    // @field: Model name
    #[serde(default = "default_ollama_model")]
    pub model: String,

    // @field: Timeout of one translation call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Timeout of the readiness probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: Max generated tokens per call
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ollama_endpoint(),
            model: default_ollama_model(),
            timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Subtitle search configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SearchConfig {
    /// Lifetime of a cached search result
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,

    /// Whether search results are cached
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    // @field: Stremio OpenSubtitles proxy
    #[serde(default = "default_stremio_base_url")]
    pub stremio_base_url: String,

    // @field: OpenSubtitles legacy REST API
    #[serde(default = "default_legacy_base_url")]
    pub legacy_base_url: String,

    // @field: User agent sent to the legacy API
    #[serde(default = "default_legacy_user_agent")]
    pub legacy_user_agent: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            timeout_secs: default_search_timeout_secs(),
            cache_enabled: true,
            stremio_base_url: default_stremio_base_url(),
            legacy_base_url: default_legacy_base_url(),
            legacy_user_agent: default_legacy_user_agent(),
        }
    }
}

impl SearchConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Translation job configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobConfig {
    /// Cues sent to the backend per call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Log entries kept for observers
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            log_capacity: default_log_capacity(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_fallback_language() -> String {
    "en".to_string()
}

fn default_subtitles_dir() -> String {
    "subtitles_cache".to_string()
}

fn default_port() -> u16 {
    7000
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "mixtral".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_temperature() -> f32 {
    0.1
}

fn default_num_predict() -> u32 {
    2000
}

fn default_retry_count() -> u32 {
    0 // A failed batch falls back to its source text
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_cache_ttl_secs() -> u64 {
    86_400
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_stremio_base_url() -> String {
    "https://opensubtitles-v3.strem.io".to_string()
}

fn default_legacy_base_url() -> String {
    "https://rest.opensubtitles.org".to_string()
}

fn default_legacy_user_agent() -> String {
    "TemporaryUserAgent".to_string()
}

fn default_batch_size() -> usize {
    20
}

fn default_log_capacity() -> usize {
    crate::hub::DEFAULT_LOG_CAPACITY
}

impl Config {
    /// Load the config file, or write and return defaults if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the config as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate languages
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;
        let _fallback_name = crate::language_utils::get_language_name(&self.fallback_language)?;

        if self.backend.model.trim().is_empty() {
            return Err(anyhow!("Backend model name is required"));
        }
        if self.backend.endpoint.trim().is_empty() {
            return Err(anyhow!("Backend endpoint is required"));
        }
        url::Url::parse(&self.backend.endpoint)
            .with_context(|| format!("Invalid backend endpoint: {}", self.backend.endpoint))?;
        if self.backend.timeout_secs == 0 {
            return Err(anyhow!("Backend timeout must be at least 1 second"));
        }
        if self.backend.probe_timeout_secs == 0 {
            return Err(anyhow!("Backend probe timeout must be at least 1 second"));
        }

        if self.job.batch_size == 0 {
            return Err(anyhow!("Batch size must be at least 1"));
        }
        if self.job.log_capacity == 0 {
            return Err(anyhow!("Log capacity must be at least 1"));
        }
        if self.subtitles_dir.trim().is_empty() {
            return Err(anyhow!("Subtitles directory is required"));
        }

        Ok(())
    }

    /// Base URL translated tracks are reachable under
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) if !url.trim().is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://127.0.0.1:{}", self.port),
        }
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            fallback_language: default_fallback_language(),
            subtitles_dir: default_subtitles_dir(),
            port: default_port(),
            public_base_url: None,
            backend: BackendConfig::default(),
            search: SearchConfig::default(),
            job: JobConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
