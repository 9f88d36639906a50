pub mod aggregator;
pub mod extractor;
pub mod fetcher;
pub mod service;
pub mod sitemap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use extractor::{ArticleExtractor, ExtractionRules, PageFields, SelectorExtractor};

pub use aggregator::NewsAggregator;
pub use fetcher::ArticleFetcher;
pub use service::{NewsMode, NewsQuery, NewsService};

/// A news item as served to the dashboard. Scraped and market-data articles
/// share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub url: String,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub published_time: Option<DateTime<Utc>>,
    pub site: String,
}

impl Article {
    pub fn from_page(url: &str, site: &str, fields: PageFields) -> Self {
        Self {
            url: url.to_string(),
            title: fields.title,
            description: fields.description,
            image_url: Some(fields.image_url),
            published_time: fields.published_time,
            site: site.to_string(),
        }
    }
}

/// A configured news origin: where its sitemap lives and how to read its pages.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub sitemap_url: String,
    pub limit: usize,
    pub extractor: Arc<dyn ArticleExtractor>,
}

impl Source {
    pub fn new(name: &str, sitemap_url: &str, limit: usize, extractor: Arc<dyn ArticleExtractor>) -> Self {
        Self {
            name: name.to_string(),
            sitemap_url: sitemap_url.to_string(),
            limit,
            extractor,
        }
    }

    pub fn from_config(config: &SourceConfig, default_limit: usize) -> Result<Self> {
        let rules = match (&config.rules, &config.preset) {
            (Some(rules), _) => rules.clone(),
            (None, Some(preset)) => ExtractionRules::preset(preset).ok_or_else(|| {
                Error::Config(format!(
                    "Unknown preset '{}' for source '{}' (known: {})",
                    preset,
                    config.name,
                    ExtractionRules::preset_names().join(", ")
                ))
            })?,
            (None, None) => {
                return Err(Error::Config(format!("Source '{}' has no extraction rules", config.name)))
            }
        };

        Ok(Self::new(
            &config.name,
            &config.sitemap_url,
            config.limit.unwrap_or(default_limit),
            Arc::new(SelectorExtractor::new(rules)?),
        ))
    }

    /// Sources in registration order.
    pub fn from_configs(configs: &[SourceConfig], default_limit: usize) -> Result<Vec<Self>> {
        configs
            .iter()
            .map(|c| Self::from_config(c, default_limit))
            .collect()
    }
}

/// How the list-news read path treats an empty cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// Return whatever the store holds; refreshes only run from the job.
    #[default]
    CacheOnly,
    /// Run one synchronous refresh when the store is empty.
    RefreshOnMiss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    Ok,
    NoNewArticles,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub candidates: usize,
    pub extracted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub status: RefreshStatus,
    pub articles_scraped: usize,
    pub sources: Vec<SourceReport>,
}
