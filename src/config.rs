use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{JimengError, Result};

/// Configuration for the Jimeng video node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API settings
    pub api: ApiConfig,

    /// Output and storage settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL used when a request does not carry its own
    pub base_url: String,

    /// Timeout for the session pool lookup (seconds)
    pub pool_timeout_seconds: u64,

    /// Timeout for the generation call (seconds)
    pub generation_timeout_seconds: u64,

    /// Timeout for the video download (seconds)
    pub download_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory downloaded videos land in
    pub output_dir: PathBuf,

    /// Media type tag reported for the video output
    pub media_type: String,

    /// File name prefix for downloaded videos
    pub filename_prefix: String,

    /// Write buffer size for streamed downloads (bytes)
    pub chunk_size: usize,

    /// Remove a partially written file when a download fails
    pub cleanup_partial_downloads: bool,

    /// Directory for staged frame uploads (OS temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log filter directive
    pub level: String,
}

impl ApiConfig {
    pub fn pool_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_timeout_seconds)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_seconds)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from the first config file found, else from the environment
    pub fn load() -> Result<Self> {
        let config_paths = [
            "jimeng-video.toml",
            "config/jimeng-video.toml",
            "~/.config/jimeng-video/config.toml",
            "/etc/jimeng-video/config.toml",
        ];

        for path in &config_paths {
            let path = expand_home(path);
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        return Ok(config.with_env_overrides());
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Ok(Self::from_env())
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)
            .map_err(|e| JimengError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config.with_env_overrides())
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(api_url) = std::env::var("JIMENG_API_URL") {
            self.api.base_url = api_url;
        }

        if let Ok(timeout) = std::env::var("JIMENG_GENERATION_TIMEOUT") {
            match timeout.parse() {
                Ok(seconds) => self.api.generation_timeout_seconds = seconds,
                Err(_) => tracing::warn!("Ignoring invalid JIMENG_GENERATION_TIMEOUT: {}", timeout),
            }
        }

        if let Ok(output_dir) = std::env::var("JIMENG_OUTPUT_DIR") {
            self.output.output_dir = PathBuf::from(output_dir);
        }

        if let Ok(media_type) = std::env::var("JIMENG_MEDIA_TYPE") {
            self.output.media_type = media_type;
        }

        if let Ok(log_level) = std::env::var("JIMENG_LOG_LEVEL") {
            self.logging.level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)
            .map_err(|e| JimengError::Config(e.to_string()))?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.api.base_url).map_err(|source| JimengError::InvalidUrl {
            url: self.api.base_url.clone(),
            source,
        })?;

        if self.api.pool_timeout_seconds == 0
            || self.api.generation_timeout_seconds == 0
            || self.api.download_timeout_seconds == 0
        {
            return Err(JimengError::Config("timeouts must be greater than 0".to_string()));
        }

        if self.output.chunk_size == 0 {
            return Err(JimengError::Config("chunk_size must be greater than 0".to_string()));
        }

        if self.output.media_type.trim().is_empty() {
            return Err(JimengError::Config("media_type must not be empty".to_string()));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Jimeng Video Configuration:\n\
            - API: {}\n\
            - Timeouts: pool {}s, generation {}s, download {}s\n\
            - Output Directory: {}\n\
            - Media Type: {}",
            self.api.base_url,
            self.api.pool_timeout_seconds,
            self.api.generation_timeout_seconds,
            self.api.download_timeout_seconds,
            self.output.output_dir.display(),
            self.output.media_type,
        )
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5566".to_string(),
            pool_timeout_seconds: 10,
            generation_timeout_seconds: 900, // generation takes minutes
            download_timeout_seconds: 120,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./output"),
            media_type: "VIDEO".to_string(),
            filename_prefix: "jimeng_video".to_string(),
            chunk_size: 8192,
            cleanup_partial_downloads: true,
            temp_dir: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "jimeng_video_node=info,warn".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.output_dir = dir;
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.config.output.media_type = media_type.into();
        self
    }

    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.temp_dir = Some(dir);
        self
    }

    pub fn with_timeouts(mut self, pool: u64, generation: u64, download: u64) -> Self {
        self.config.api.pool_timeout_seconds = pool;
        self.config.api.generation_timeout_seconds = generation;
        self.config.api.download_timeout_seconds = download;
        self
    }

    pub fn cleanup_partial_downloads(mut self, enable: bool) -> Self {
        self.config.output.cleanup_partial_downloads = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
