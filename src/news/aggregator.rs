use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::config::{Config, DEFAULT_CACHE_KEY};
use crate::error::Result;
use crate::news::{
    Article, ArticleFetcher, ReadMode, RefreshReport, RefreshStatus, Source, SourceReport,
};
use crate::storage::KeyValueStore;

/// Builds the merged article list from every source and keeps it in the store.
pub struct NewsAggregator {
    fetcher: ArticleFetcher,
    sources: Vec<Source>,
    store: Arc<dyn KeyValueStore>,
    key: String,
    ttl: Duration,
    concurrency: usize,
    dedupe_by_url: bool,
    read_mode: ReadMode,
    miss_lock: Mutex<()>,
}

impl NewsAggregator {
    pub fn new(fetcher: ArticleFetcher, sources: Vec<Source>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            fetcher,
            sources,
            store,
            key: DEFAULT_CACHE_KEY.to_string(),
            ttl: Duration::from_secs(7200),
            concurrency: 5,
            dedupe_by_url: true,
            read_mode: ReadMode::CacheOnly,
            miss_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let fetcher = ArticleFetcher::new()?
            .with_timeout(config.settings.timeout())
            .with_user_agent(config.settings.user_agent.clone());
        let sources = Source::from_configs(&config.sources, config.settings.sitemap_limit)?;

        Ok(Self::new(fetcher, sources, store)
            .with_key(&config.cache.key)
            .with_ttl(config.cache.ttl())
            .with_concurrency(config.settings.concurrent_fetches)
            .with_dedupe(config.settings.dedupe_by_url)
            .with_read_mode(config.settings.read_mode))
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_dedupe(mut self, dedupe_by_url: bool) -> Self {
        self.dedupe_by_url = dedupe_by_url;
        self
    }

    pub fn with_read_mode(mut self, read_mode: ReadMode) -> Self {
        self.read_mode = read_mode;
        self
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run one refresh cycle over every source.
    ///
    /// A source that fails is recorded in the report and skipped. The store
    /// is only written when at least one article was extracted, so a bad run
    /// never replaces good data.
    #[instrument(level = "info", skip_all, fields(key = %self.key))]
    pub async fn refresh(&self) -> Result<RefreshReport> {
        info!("Starting refresh across {} sources", self.sources.len());

        let mut articles = Vec::new();
        let mut reports = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match self.refresh_source(source).await {
                Ok((candidates, found)) => {
                    info!(
                        source = %source.name,
                        candidates,
                        extracted = found.len(),
                        "Scraped source"
                    );
                    reports.push(SourceReport {
                        name: source.name.clone(),
                        candidates,
                        extracted: found.len(),
                        error: None,
                    });
                    articles.extend(found);
                }
                Err(e) => {
                    error!(source = %source.name, error = %e, "Failed to process source");
                    reports.push(SourceReport {
                        name: source.name.clone(),
                        candidates: 0,
                        extracted: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        if self.dedupe_by_url {
            let before = articles.len();
            articles = dedupe_by_url(articles);
            if articles.len() < before {
                debug!("Dropped {} duplicate articles", before - articles.len());
            }
        }

        #[cfg(feature = "metrics")]
        metrics::counter!("finboard_refresh_cycles_total", 1);

        if articles.is_empty() {
            info!("Refresh finished with no new articles; cache left untouched");
            return Ok(RefreshReport {
                status: RefreshStatus::NoNewArticles,
                articles_scraped: 0,
                sources: reports,
            });
        }

        let payload = serde_json::to_string(&articles)?;
        self.store.set(&self.key, payload, self.ttl).await?;

        #[cfg(feature = "metrics")]
        metrics::gauge!("finboard_cached_articles", articles.len() as f64);

        info!(total = articles.len(), backend = self.store.backend(), "Refresh finished, cache updated");
        Ok(RefreshReport {
            status: RefreshStatus::Ok,
            articles_scraped: articles.len(),
            sources: reports,
        })
    }

    /// Candidate count and the articles extracted, in sitemap order.
    async fn refresh_source(&self, source: &Source) -> Result<(usize, Vec<Article>)> {
        let urls = self
            .fetcher
            .list_candidate_urls(&source.sitemap_url, source.limit)
            .await?;
        let candidates = urls.len();

        let fetcher = &self.fetcher;
        let site = source.name.as_str();
        let extractor = source.extractor.as_ref();

        // `buffered` keeps discovery order while bounding in-flight requests.
        let articles: Vec<Article> = stream::iter(urls)
            .map(move |url| async move { fetcher.extract_article(&url, site, extractor).await })
            .buffered(self.concurrency)
            .filter_map(|article| async move { article.filter(|a| !a.url.is_empty()) })
            .collect()
            .await;

        Ok((candidates, articles))
    }

    /// Whatever the store currently holds; empty when nothing is cached, the
    /// entry expired, or the store cannot be read.
    pub async fn get_cached(&self) -> Vec<Article> {
        match self.store.get(&self.key).await {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<Article>>(&payload) {
                Ok(articles) => articles,
                Err(e) => {
                    warn!(key = %self.key, error = %e, "Cached payload is not an article list");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key = %self.key, error = %e, "Cache read failed");
                Vec::new()
            }
        }
    }

    /// The list-news read path. Honors the configured [`ReadMode`].
    pub async fn read(&self) -> Vec<Article> {
        let cached = self.get_cached().await;
        if !cached.is_empty() || self.read_mode == ReadMode::CacheOnly {
            return cached;
        }

        // One refresh at a time; late arrivals see the result of the first.
        let _guard = self.miss_lock.lock().await;
        let cached = self.get_cached().await;
        if !cached.is_empty() {
            return cached;
        }

        info!("Cache miss, refreshing synchronously");
        if let Err(e) = self.refresh().await {
            error!(error = %e, "Synchronous refresh failed");
        }
        self.get_cached().await
    }
}

/// First occurrence of each URL wins.
fn dedupe_by_url(articles: Vec<Article>) -> Vec<Article> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|a| seen.insert(a.url.clone()))
        .collect()
}
