use std::path::{Path, PathBuf};
use std::fs;
use std::sync::Arc;
use clap_complete::{generate, Shell};
use clap::CommandFactory;
use tracing::{info, warn, debug};
use tracing_appender::non_blocking::WorkerGuard;

use crate::cli::Cli;
use crate::config::{Config, StoreBackend, LoggingConfig};
use crate::market::MarketClient;
use crate::news::extractor::ExtractionRules;
use crate::news::{NewsAggregator, RefreshStatus};
use crate::storage::open_store;
use crate::error::{Error, Result};

/// Write a default configuration file
pub async fn init(config_path: Option<PathBuf>, force: bool) -> Result<()> {
    info!("Initializing finboard configuration");

    let config_file = get_config_file(config_path)?;
    if let Some(dir) = config_file.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)?;
            info!("Created configuration directory: {}", dir.display());
        }
    }

    if config_file.exists() && !force {
        warn!("Configuration file already exists: {}", config_file.display());
        println!("⚠️  Configuration file already exists: {}", config_file.display());
        println!("   Use --force to overwrite it.");
        return Ok(());
    }

    fs::write(&config_file, create_default_config())?;
    info!("Created default configuration: {}", config_file.display());

    println!("✅ finboard initialized successfully!");
    println!("   Config file: {}", config_file.display());
    println!("");
    println!("Next steps:");
    println!("   1. Export your market data key: export FMP_API_KEY=...");
    println!("   2. Try one refresh: finboard scrape");
    println!("   3. Start the API: finboard serve");

    Ok(())
}

/// Run the HTTP API until interrupted
pub async fn serve(
    config_path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    no_initial_refresh: bool,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path.as_deref())?;
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if no_initial_refresh {
        config.server.refresh_on_start = false;
    }

    #[cfg(feature = "metrics")]
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .map_err(|e| Error::Config(format!("Failed to install metrics exporter: {}", e)))?;

    println!("🚀 Starting finboard API");
    println!("   Address: http://{}:{}", config.server.bind, config.server.port);
    println!("   Sources: {}", config.sources.len());
    println!("   Refresh interval: {}s", config.settings.refresh_interval);
    println!("   Store backend: {:?}", config.cache.backend);
    println!("   Press Ctrl+C to stop");
    println!("");

    crate::server::run(config).await?;

    println!("\n✅ Server stopped");
    Ok(())
}

/// Run one refresh cycle
pub async fn scrape(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let aggregator = build_aggregator(&config)?;

    if config.cache.backend == StoreBackend::Memory {
        println!("⚠️  The memory store does not outlive this command.");
        println!("   Set [cache] backend = \"file\" or \"rest\" to keep the result.");
        println!("");
    }

    println!("🔄 Scraping {} sources...", aggregator.sources().len());
    let report = aggregator.refresh().await?;

    for source in &report.sources {
        match &source.error {
            None => println!(
                "   {} ... ✅ ({} of {} pages extracted)",
                source.name, source.extracted, source.candidates
            ),
            Some(e) => println!("   {} ... ❌ Error: {}", source.name, e),
        }
    }

    println!("\n📊 Scrape Summary:");
    match report.status {
        RefreshStatus::Ok => println!("   ✅ Cached {} articles", report.articles_scraped),
        RefreshStatus::NoNewArticles => println!("   ⚠️  No new articles; cache left untouched"),
        RefreshStatus::Error => println!("   ❌ Refresh failed"),
    }

    Ok(())
}

/// Print the cached article list
pub async fn show(config_path: Option<PathBuf>, limit: Option<usize>, json: bool) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let aggregator = build_aggregator(&config)?;

    let mut articles = aggregator.get_cached().await;
    if let Some(limit) = limit {
        articles.truncate(limit);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&articles)?);
        return Ok(());
    }

    if articles.is_empty() {
        println!(
            "📋 No cached articles under '{}' ({} store).",
            aggregator.key(),
            aggregator.store().backend()
        );
        println!("   Populate the cache with: finboard scrape");
        return Ok(());
    }

    println!("📋 Cached Articles ({}):", articles.len());
    println!("========================");
    for article in &articles {
        println!("\n📰 {}", article.title);
        println!("   Site: {}", article.site);
        println!("   URL: {}", article.url);
        if let Some(published) = article.published_time {
            println!("   Published: {}", published.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }

    Ok(())
}

/// List configured sources
pub async fn list_sources(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;

    if config.sources.is_empty() {
        println!("📋 No sources configured yet.");
        return Ok(());
    }

    println!("📋 Configured News Sources:");
    println!("===========================");

    for source in &config.sources {
        println!("\n📰 {}", source.name);
        println!("   Sitemap: {}", source.sitemap_url);
        println!("   Limit: {}", source.limit.unwrap_or(config.settings.sitemap_limit));
        match (&source.rules, &source.preset) {
            (Some(_), _) => println!("   Extraction: custom rules"),
            (None, Some(preset)) => println!("   Extraction: preset '{}'", preset),
            (None, None) => println!("   Extraction: none"),
        }
    }

    println!("\n💡 Available presets: {}", ExtractionRules::preset_names().join(", "));

    Ok(())
}

/// Probe the market data API key
pub async fn check_key(config_path: Option<PathBuf>) -> Result<()> {
    let config = Config::load_or_default(config_path.as_deref())?;
    let market = MarketClient::from_config(&config.market, config.settings.timeout())?;

    if !market.has_key() {
        println!("❌ FMP_API_KEY is not set");
        return Err(Error::ConfigMissing("FMP_API_KEY is not set".to_string()));
    }

    let status = market.check_key().await?;
    if status.accepted {
        println!("✅ {}", status.message);
    } else {
        println!("❌ {}", status.message);
        if let Some(response) = &status.api_response {
            println!("   Provider said: {}", response);
        }
    }

    Ok(())
}

/// Generate shell completions
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let cmd_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, cmd_name, &mut std::io::stdout());
}

fn build_aggregator(config: &Config) -> Result<NewsAggregator> {
    let store = open_store(&config.cache, config.settings.timeout())?;
    debug!("Opened {} store", store.backend());
    NewsAggregator::from_config(config, Arc::clone(&store))
}

/// Initialize logging from the verbosity flags and the `[logging]` table.
///
/// The returned guard flushes the log file on drop; keep it alive for the
/// lifetime of the command.
pub fn init_logging(debug: bool, verbose: bool, config_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::{fmt, EnvFilter};

    let logging = Config::load_or_default(config_path)
        .map(|c| c.logging)
        .unwrap_or_default();

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let (writer, guard) = if logging.log_to_file {
        let (writer, guard) = file_writer(&logging)?;
        (BoxMakeWriter::new(writer), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stderr), None)
    };

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug)
        .with_writer(writer);

    let result = if logging.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    debug!("Logging initialized");
    Ok(guard)
}

/// Relative log paths live under the configuration directory.
fn file_writer(logging: &LoggingConfig) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let path = Path::new(&logging.log_file);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        Config::config_dir()?.join(path)
    };

    let dir = path
        .parent()
        .ok_or_else(|| Error::Config(format!("Invalid log file path: {}", path.display())))?;
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Config(format!("Invalid log file path: {}", path.display())))?;
    fs::create_dir_all(dir)?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Get the configuration file path
fn get_config_file(config_path: Option<PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path),
        None => Ok(Config::config_dir()?.join("config.toml")),
    }
}

/// Create default configuration content
fn create_default_config() -> String {
    format!(r#"# finboard configuration file
# Generated on {}

[settings]
# Seconds between scheduled news refreshes (default: 1 hour)
refresh_interval = 3600

# Article URLs taken from each sitemap unless a source sets its own limit
sitemap_limit = 20

# Article pages fetched at the same time per source
concurrent_fetches = 5

# Per-request timeout in seconds
timeout = 10

# Drop later articles whose URL was already seen in the same refresh
dedupe_by_url = true

# "cache-only" answers from the store; "refresh-on-miss" scrapes when it is empty
read_mode = "cache-only"

[cache]
# Store backend: "memory", "file" or "rest"
backend = "memory"

# Key the aggregated article list is stored under
key = "aggregated_news_articles"

# Seconds a stored article list stays valid (default: 2 hours)
ttl = 7200

# File backend location (defaults to the user cache directory)
# path = "/var/lib/finboard/store.json"

# The rest backend reads KV_REST_API_URL and KV_REST_API_TOKEN from the environment

[server]
bind = "127.0.0.1"
port = 3000

# Run one refresh as soon as the server starts
refresh_on_start = true

# What /api/news returns without a search: "cached" or "general-feed"
news_mode = "cached"

[market]
# The API key is read from FMP_API_KEY
base_url = "https://financialmodelingprep.com/api/v3"
search_limit = 20
news_limit = 10
feed_size = 40
feed_ttl = 3600
actives_limit = 50
history_days = 100

[logging]
# Log level: error, warn, info, debug, trace
level = "info"

# Log to file
log_to_file = false

# Log file path (relative to config directory)
log_file = "logs/finboard.log"

# Emit JSON lines instead of plain text
json_format = false

# News sources. Each one needs a preset ({presets}) or explicit rules.
[[sources]]
name = "Reuters Business"
sitemap_url = "https://www.reuters.com/sitemap_news_us_business.xml"
preset = "reuters"

# Example with explicit rules:
#
# [[sources]]
# name = "Example Markets"
# sitemap_url = "https://news.example.com/sitemap.xml"
# limit = 10
#
# [sources.rules.title]
# tag = "h1"
#
# [sources.rules.description]
# tag = "meta"
# match_attr = {{ name = "name", value = "description" }}
# attr = "content"
#
# [sources.rules.image]
# tag = "meta"
# match_attr = {{ name = "property", value = "og:image" }}
# attr = "content"
"#,
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        presets = ExtractionRules::preset_names().join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_default_config() {
        let content = create_default_config();
        assert!(content.contains("[settings]"));
        assert!(content.contains("[[sources]]"));
        assert!(content.contains("[logging]"));

        let config: Config = toml::from_str(&content).unwrap();
        config.validate().unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.server.port, 3000);
    }

    #[tokio::test]
    async fn test_init_command() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");

        init(Some(config_file.clone()), false).await.unwrap();
        assert!(config_file.exists());

        fs::write(&config_file, "# edited").unwrap();
        init(Some(config_file.clone()), false).await.unwrap();
        assert_eq!(fs::read_to_string(&config_file).unwrap(), "# edited");

        init(Some(config_file.clone()), true).await.unwrap();
        assert!(fs::read_to_string(&config_file).unwrap().contains("[settings]"));
    }

    #[tokio::test]
    async fn test_list_sources_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        fs::write(&config_file, create_default_config()).unwrap();

        list_sources(Some(config_file)).await.unwrap();
    }

    #[tokio::test]
    async fn test_show_empty_cache() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        fs::write(&config_file, "[cache]\nbackend = \"memory\"\n").unwrap();

        show(Some(config_file.clone()), Some(5), false).await.unwrap();
        show(Some(config_file), None, true).await.unwrap();
    }

    #[test]
    fn test_init_logging() {
        // Another test may already own the global subscriber.
        let _ = init_logging(false, false, None);
    }
}
