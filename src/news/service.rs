//! One read path for every news listing the dashboard shows.
//!
//! The handler picks a [`NewsMode`]; the service decides where the articles
//! come from. Malformed upstream payloads degrade to an empty list, while a
//! missing API key or an unreachable provider is an error for the caller.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::error::{Error, Result};
use crate::market::MarketClient;
use crate::news::{Article, NewsAggregator};
use crate::storage::MemoSlot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewsMode {
    /// Resolve symbols matching a free-text query, then fetch their news.
    Search(String),
    /// News for one symbol.
    TickerNews(String),
    /// The provider's general feed, memoized in-process.
    GeneralFeed,
    /// The scraped, store-backed article list.
    Cached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsQuery {
    pub mode: NewsMode,
    /// Overrides the configured per-mode limit.
    pub limit: Option<usize>,
}

impl NewsQuery {
    pub fn new(mode: NewsMode) -> Self {
        Self { mode, limit: None }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

pub struct NewsService {
    market: MarketClient,
    aggregator: Arc<NewsAggregator>,
    feed: MemoSlot<Vec<Article>>,
    search_limit: usize,
    news_limit: usize,
    feed_size: usize,
}

impl NewsService {
    pub fn new(market: MarketClient, aggregator: Arc<NewsAggregator>, config: &MarketConfig) -> Self {
        Self {
            market,
            aggregator,
            feed: MemoSlot::new(Duration::from_secs(config.feed_ttl)),
            search_limit: config.search_limit,
            news_limit: config.news_limit,
            feed_size: config.feed_size,
        }
    }

    pub fn aggregator(&self) -> &NewsAggregator {
        &self.aggregator
    }

    pub fn aggregator_handle(&self) -> Arc<NewsAggregator> {
        Arc::clone(&self.aggregator)
    }

    pub fn market(&self) -> &MarketClient {
        &self.market
    }

    pub async fn list(&self, query: NewsQuery) -> Result<Vec<Article>> {
        let result = match &query.mode {
            NewsMode::Cached => {
                let mut articles = self.aggregator.read().await;
                if let Some(limit) = query.limit {
                    articles.truncate(limit);
                }
                return Ok(articles);
            }
            NewsMode::Search(q) => self.search(q, query.limit).await,
            NewsMode::TickerNews(symbol) => {
                let limit = query.limit.unwrap_or(self.news_limit);
                self.market
                    .ticker_news(&[symbol.to_uppercase()], limit)
                    .await
            }
            NewsMode::GeneralFeed => self.general_feed(query.limit).await,
        };

        match result {
            Err(Error::MalformedUpstreamPayload(msg)) => {
                warn!("Treating malformed upstream payload as empty ({:?}): {}", query.mode, msg);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn search(&self, q: &str, limit: Option<usize>) -> Result<Vec<Article>> {
        let q = q.trim();
        if q.is_empty() {
            return Ok(Vec::new());
        }

        let symbols: Vec<String> = self
            .market
            .search_tickers(q, self.search_limit)
            .await?
            .into_iter()
            .map(|m| m.symbol)
            .collect();

        debug!("Search '{}' matched {} symbols", q, symbols.len());
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        self.market
            .ticker_news(&symbols, limit.unwrap_or(self.news_limit))
            .await
    }

    async fn general_feed(&self, limit: Option<usize>) -> Result<Vec<Article>> {
        let articles = match self.feed.get() {
            Some(articles) => articles,
            None => {
                let fresh = self.market.general_articles(0, self.feed_size).await?;
                self.feed.put(fresh.clone());
                fresh
            }
        };

        Ok(match limit {
            Some(n) => articles.into_iter().take(n).collect(),
            None => articles,
        })
    }
}
