//! Configuration management for Samarth.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (.samarth/config.yaml)
//! - Environment variables
//! - Command-line flags
//!
//! The configuration is workspace-centric: cache, audit trail and template
//! overrides are stored in `.samarth/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::logging::LogFormat;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .samarth/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Log line format
    pub log_format: LogFormat,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Overall budget for one question, extraction through assembly
    pub request_timeout_ms: u64,

    /// Data provider settings
    pub sources: SourcesConfig,

    /// Cache store settings
    pub cache: CacheConfig,

    /// Confidence label thresholds
    pub quality: QualityConfig,
}

/// Settings shared by the data.gov.in adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Portal API base URL
    #[serde(rename = "baseUrl", alias = "base_url")]
    pub base_url: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "apiKeyEnv", alias = "api_key_env")]
    pub api_key_env: String,

    /// Resolved API key (never read from or written to the YAML file)
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Bounded timeout for one live call
    #[serde(rename = "timeoutMs", alias = "timeout_ms")]
    pub timeout_ms: u64,

    /// Base delay before the single retry (doubled once)
    #[serde(rename = "retryBaseDelayMs", alias = "retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Maximum records requested per live call
    #[serde(rename = "recordLimit", alias = "record_limit")]
    pub record_limit: u32,

    /// Portal resource identifiers
    pub datasets: DatasetIds,
}

/// data.gov.in resource identifiers, one per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetIds {
    #[serde(rename = "cropProduction", alias = "crop_production")]
    pub crop_production: String,
    pub rainfall: String,
    #[serde(rename = "marketPrices", alias = "market_prices")]
    pub market_prices: String,
}

/// Which Cache Store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    /// Process memory; entries die with the process
    #[default]
    Memory,
    /// SQLite file; entries survive between invocations
    Sqlite,
}

/// Cache Store settings. TTLs are first-class configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackendKind,

    /// SQLite file (defaults to .samarth/cache.db)
    pub path: Option<PathBuf>,

    /// TTL for general datasets (production, rainfall)
    #[serde(rename = "generalTtlSecs", alias = "general_ttl_secs")]
    pub general_ttl_secs: u64,

    /// TTL for price-sensitive datasets
    #[serde(rename = "priceTtlSecs", alias = "price_ttl_secs")]
    pub price_ttl_secs: u64,

    /// TTL for synthesized fallback data, kept short so live sources are retried soon
    #[serde(rename = "fallbackTtlSecs", alias = "fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,
}

/// Thresholds mapping quality scores onto confidence labels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    #[serde(rename = "veryHigh", alias = "very_high")]
    pub very_high: f64,
    pub high: f64,
    pub medium: f64,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    sources: Option<SourcesConfig>,
    cache: Option<CacheConfig>,
    quality: Option<QualityConfig>,
    logging: Option<LoggingConfig>,
    #[serde(rename = "requestTimeoutMs", alias = "request_timeout_ms")]
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
    format: Option<LogFormat>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.data.gov.in".to_string(),
            api_key_env: "DATA_GOV_API_KEY".to_string(),
            api_key: None,
            timeout_ms: 10_000,
            retry_base_delay_ms: 250,
            record_limit: 100,
            datasets: DatasetIds::default(),
        }
    }
}

impl Default for DatasetIds {
    fn default() -> Self {
        Self {
            crop_production: "9ef84268-d588-465a-a308-a864a43d0070".to_string(),
            rainfall: "88f7c9b1-4a8f-4c8e-b4e1-7c8b9a0f1e2d".to_string(),
            market_prices: "current-daily-price-various-commodities-various-markets-mandis"
                .to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Memory,
            path: None,
            general_ttl_secs: 3600,
            price_ttl_secs: 1800,
            fallback_ttl_secs: 300,
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            very_high: 0.9,
            high: 0.75,
            medium: 0.5,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            log_format: LogFormat::Text,
            verbose: false,
            no_color: false,
            request_timeout_ms: 20_000,
            sources: SourcesConfig::default(),
            cache: CacheConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and environment variables.
    ///
    /// Environment variables:
    /// - `SAMARTH_WORKSPACE`: Override workspace path
    /// - `SAMARTH_CONFIG`: Path to config file
    /// - `SAMARTH_BASE_URL`: Portal API base URL
    /// - `SAMARTH_TIMEOUT_MS`: Per-question timeout
    /// - `SAMARTH_LOG_FORMAT`: `text` or `json`
    /// - `DATA_GOV_API_KEY` (or the configured `apiKeyEnv`): API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use samarth_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Workspace: {:?}", config.workspace);
    /// ```
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("SAMARTH_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("SAMARTH_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.samarth_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(base_url) = std::env::var("SAMARTH_BASE_URL") {
            config.sources.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("SAMARTH_TIMEOUT_MS") {
            config.request_timeout_ms = timeout.parse().map_err(|_| {
                AppError::Config(format!("SAMARTH_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }

        if let Some(format) = std::env::var("SAMARTH_LOG_FORMAT")
            .ok()
            .and_then(|f| LogFormat::parse(&f))
        {
            config.log_format = format;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        config.sources.api_key = config.resolve_api_key();

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(self.merge_file(config_file))
    }

    fn merge_file(&self, file: ConfigFile) -> Self {
        let mut result = self.clone();

        if let Some(sources) = file.sources {
            result.sources = SourcesConfig {
                api_key: result.sources.api_key.take(),
                ..sources
            };
        }

        if let Some(cache) = file.cache {
            result.cache = cache;
        }

        if let Some(quality) = file.quality {
            result.quality = quality;
        }

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_format = format;
            }
        }

        if let Some(timeout) = file.request_timeout_ms {
            result.request_timeout_ms = timeout;
        }

        result
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over environment variables and the YAML file.
    /// `offline` drops any resolved API key so every adapter serves fallback data.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        log_level: Option<String>,
        log_format: Option<LogFormat>,
        request_timeout_ms: Option<u64>,
        verbose: bool,
        no_color: bool,
        offline: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if let Some(log_format) = log_format {
            self.log_format = log_format;
        }

        if let Some(timeout) = request_timeout_ms {
            self.request_timeout_ms = timeout;
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        if offline {
            self.sources.api_key = None;
        }

        self
    }

    /// Get the path to the .samarth directory.
    pub fn samarth_dir(&self) -> PathBuf {
        self.workspace.join(".samarth")
    }

    /// Ensure the .samarth directory exists.
    pub fn ensure_samarth_dir(&self) -> AppResult<()> {
        let dir = self.samarth_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .samarth directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// SQLite cache file location.
    pub fn cache_path(&self) -> PathBuf {
        self.cache
            .path
            .clone()
            .unwrap_or_else(|| self.samarth_dir().join("cache.db"))
    }

    /// Audit trail location.
    pub fn audit_path(&self) -> PathBuf {
        self.samarth_dir().join("audit.jsonl")
    }

    /// Directory holding narrative template overrides.
    pub fn templates_dir(&self) -> PathBuf {
        self.samarth_dir().join("templates")
    }

    /// Resolve the API key from the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.sources.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AppResult<()> {
        let q = &self.quality;
        let in_range = |v: f64| v > 0.0 && v <= 1.0;

        if !(in_range(q.very_high) && in_range(q.high) && in_range(q.medium)) {
            return Err(AppError::Config(format!(
                "Quality thresholds must lie in (0, 1]: {:?}",
                q
            )));
        }

        if !(q.very_high >= q.high && q.high >= q.medium) {
            return Err(AppError::Config(format!(
                "Quality thresholds must descend very_high >= high >= medium: {:?}",
                q
            )));
        }

        let c = &self.cache;
        if c.general_ttl_secs == 0 || c.price_ttl_secs == 0 || c.fallback_ttl_secs == 0 {
            return Err(AppError::Config("Cache TTLs must be positive".to_string()));
        }

        if self.sources.timeout_ms == 0 || self.request_timeout_ms == 0 {
            return Err(AppError::Config("Timeouts must be positive".to_string()));
        }

        if !self.sources.base_url.starts_with("http://")
            && !self.sources.base_url.starts_with("https://")
        {
            return Err(AppError::Config(format!(
                "Invalid base URL: {}",
                self.sources.base_url
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.sources.base_url, "https://api.data.gov.in");
        assert_eq!(config.cache.general_ttl_secs, 3600);
        assert_eq!(config.cache.price_ttl_secs, 1800);
        assert_eq!(config.cache.fallback_ttl_secs, 300);
        assert!(config.sources.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_samarth_paths() {
        let config = AppConfig::default();
        assert!(config.samarth_dir().ends_with(".samarth"));
        assert!(config.cache_path().ends_with("cache.db"));
        assert!(config.audit_path().ends_with("audit.jsonl"));
    }

    #[test]
    fn test_with_overrides() {
        let mut config = AppConfig::default();
        config.sources.api_key = Some("secret".to_string());

        let overridden = config.with_overrides(
            None,
            None,
            None,
            Some(LogFormat::Json),
            Some(5_000),
            true,
            false,
            true,
        );

        assert!(overridden.verbose);
        assert_eq!(overridden.log_level, Some("debug".to_string()));
        assert_eq!(overridden.log_format, LogFormat::Json);
        assert_eq!(overridden.request_timeout_ms, 5_000);
        assert!(overridden.sources.api_key.is_none());
    }

    #[test]
    fn test_merge_yaml_sections() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
sources:
  baseUrl: "http://localhost:9000"
  timeoutMs: 1500
cache:
  backend: sqlite
  priceTtlSecs: 600
quality:
  veryHigh: 0.95
  high: 0.8
  medium: 0.6
logging:
  level: warn
  color: false
requestTimeoutMs: 7000
"#,
        )
        .unwrap();

        let merged = AppConfig::default().merge_yaml(&path).unwrap();
        assert_eq!(merged.sources.base_url, "http://localhost:9000");
        assert_eq!(merged.sources.timeout_ms, 1500);
        assert_eq!(merged.sources.record_limit, 100);
        assert_eq!(merged.cache.backend, CacheBackendKind::Sqlite);
        assert_eq!(merged.cache.price_ttl_secs, 600);
        assert_eq!(merged.cache.general_ttl_secs, 3600);
        assert_eq!(merged.quality.very_high, 0.95);
        assert_eq!(merged.log_level, Some("warn".to_string()));
        assert!(merged.no_color);
        assert_eq!(merged.request_timeout_ms, 7000);
    }

    #[test]
    fn test_merge_yaml_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "sources: [not, a, map]").unwrap();

        let result = AppConfig::default().merge_yaml(&path);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unordered_thresholds() {
        let mut config = AppConfig::default();
        config.quality.high = 0.95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let mut config = AppConfig::default();
        config.cache.fallback_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
