use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{ConfigError, Result};
use crate::news::extractor::ExtractionRules;
use crate::news::ReadMode;

pub const DEFAULT_CACHE_KEY: &str = "aggregated_news_articles";
pub const DEFAULT_MARKET_URL: &str = "https://financialmodelingprep.com/api/v3";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// A news origin as written in the config file.
///
/// Either `preset` names a built-in rule set or `rules` spells the rules out;
/// `rules` wins when both are present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub sitemap_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<ExtractionRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,

    #[serde(default = "default_sitemap_limit")]
    pub sitemap_limit: usize,

    #[serde(default = "default_concurrent_fetches")]
    pub concurrent_fetches: usize,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_dedupe_by_url")]
    pub dedupe_by_url: bool,

    #[serde(default)]
    pub read_mode: ReadMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_cache_key")]
    pub key: String,

    #[serde(default = "default_cache_ttl")]
    pub ttl: u64,

    /// File backend location; defaults to the user cache directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultNewsMode {
    #[default]
    Cached,
    GeneralFeed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_refresh_on_start")]
    pub refresh_on_start: bool,

    #[serde(default)]
    pub news_mode: DefaultNewsMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_market_url")]
    pub base_url: String,

    /// Usually supplied through `FMP_API_KEY` rather than the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    #[serde(default = "default_news_limit")]
    pub news_limit: usize,

    #[serde(default = "default_feed_size")]
    pub feed_size: usize,

    #[serde(default = "default_feed_ttl")]
    pub feed_ttl: u64,

    #[serde(default = "default_actives_limit")]
    pub actives_limit: usize,

    /// Trading days returned by the price history routes.
    #[serde(default = "default_history_days")]
    pub history_days: usize,

    #[serde(default = "default_crypto_symbols")]
    pub crypto_symbols: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default)]
    pub json_format: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::NotFound(path.as_ref().display().to_string()))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load the file when it exists, otherwise start from defaults. Env
    /// overrides apply either way.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_dir()?.join("config.toml"),
        };

        if path.exists() {
            Self::load_with_env(&path)
        } else {
            tracing::debug!("No config file at {}, using defaults", path.display());
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid("Source name cannot be empty".to_string()));
            }

            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::AlreadyExists(format!("Source '{}' is defined twice", source.name)));
            }

            let url = url::Url::parse(&source.sitemap_url)
                .map_err(|_| ConfigError::InvalidUrl(source.sitemap_url.clone()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidUrl(source.sitemap_url.clone()));
            }

            if source.limit == Some(0) {
                return Err(ConfigError::Invalid(format!("Source '{}' limit must be greater than 0", source.name)));
            }

            if source.rules.is_none() && source.preset.is_none() {
                return Err(ConfigError::Invalid(format!("Source '{}' needs either a preset or rules", source.name)));
            }
        }

        if self.settings.refresh_interval == 0 {
            return Err(ConfigError::Invalid("Refresh interval must be greater than 0".to_string()));
        }

        if self.settings.sitemap_limit == 0 {
            return Err(ConfigError::Invalid("Sitemap limit must be greater than 0".to_string()));
        }

        if self.settings.concurrent_fetches == 0 {
            return Err(ConfigError::Invalid("Concurrent fetches must be greater than 0".to_string()));
        }

        if self.cache.ttl == 0 {
            return Err(ConfigError::Invalid("Cache TTL must be greater than 0".to_string()));
        }

        if self.cache.key.is_empty() {
            return Err(ConfigError::Invalid("Cache key cannot be empty".to_string()));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("FMP_API_KEY") {
            if !key.trim().is_empty() {
                self.market.api_key = Some(key);
            }
        }

        if let Ok(url) = std::env::var("KV_REST_API_URL") {
            self.cache.rest_url = Some(url);
        }

        if let Ok(token) = std::env::var("KV_REST_API_TOKEN") {
            self.cache.rest_token = Some(token);
        }

        if let Ok(interval) = std::env::var("FINBOARD_REFRESH_INTERVAL") {
            if let Ok(val) = interval.parse() {
                self.settings.refresh_interval = val;
            }
        }

        if let Ok(ttl) = std::env::var("FINBOARD_CACHE_TTL") {
            if let Ok(val) = ttl.parse() {
                self.cache.ttl = val;
            }
        }

        if let Ok(port) = std::env::var("FINBOARD_PORT") {
            if let Ok(val) = port.parse() {
                self.server.port = val;
            }
        }

        if let Ok(bind) = std::env::var("FINBOARD_BIND") {
            self.server.bind = bind;
        }

        if let Ok(level) = std::env::var("FINBOARD_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("finboard"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine config directory".to_string()))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join("finboard"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine cache directory".to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            settings: Settings::default(),
            cache: CacheSettings::default(),
            server: ServerConfig::default(),
            market: MarketConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            sitemap_limit: default_sitemap_limit(),
            concurrent_fetches: default_concurrent_fetches(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            dedupe_by_url: default_dedupe_by_url(),
            read_mode: ReadMode::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            key: default_cache_key(),
            ttl: default_cache_ttl(),
            path: None,
            rest_url: None,
            rest_token: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            refresh_on_start: default_refresh_on_start(),
            news_mode: DefaultNewsMode::default(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: default_market_url(),
            api_key: None,
            search_limit: default_search_limit(),
            news_limit: default_news_limit(),
            feed_size: default_feed_size(),
            feed_ttl: default_feed_ttl(),
            actives_limit: default_actives_limit(),
            history_days: default_history_days(),
            crypto_symbols: default_crypto_symbols(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: false,
            log_file: default_log_file(),
            json_format: false,
        }
    }
}

fn default_sources() -> Vec<SourceConfig> {
    vec![SourceConfig {
        name: "Reuters Business".to_string(),
        sitemap_url: "https://www.reuters.com/sitemap_news_us_business.xml".to_string(),
        limit: None,
        preset: Some("reuters".to_string()),
        rules: None,
    }]
}

fn default_refresh_interval() -> u64 { 3600 }
fn default_sitemap_limit() -> usize { 20 }
fn default_concurrent_fetches() -> usize { 5 }
fn default_timeout() -> u64 { 10 }
fn default_user_agent() -> String {
    format!("finboard/{}", env!("CARGO_PKG_VERSION"))
}
fn default_dedupe_by_url() -> bool { true }

fn default_cache_key() -> String { DEFAULT_CACHE_KEY.to_string() }
fn default_cache_ttl() -> u64 { 7200 }

fn default_bind() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 3000 }
fn default_refresh_on_start() -> bool { true }

fn default_market_url() -> String { DEFAULT_MARKET_URL.to_string() }
fn default_search_limit() -> usize { 20 }
fn default_news_limit() -> usize { 10 }
fn default_feed_size() -> usize { 40 }
fn default_feed_ttl() -> u64 { 3600 }
fn default_actives_limit() -> usize { 50 }
fn default_history_days() -> usize { 100 }
fn default_crypto_symbols() -> Vec<String> {
    [
        "BTCUSD", "ETHUSD", "BNBUSD", "SOLUSD", "XRPUSD", "DOGEUSD", "ADAUSD", "AVAXUSD",
        "SHIBUSD", "DOTUSD", "TRXUSD", "LINKUSD", "MATICUSD", "LTCUSD", "BCHUSD",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_file() -> String { "logs/finboard.log".to_string() }
