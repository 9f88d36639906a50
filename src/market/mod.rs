//! Thin wrapper over the Financial Modeling Prep market-data API.
//!
//! Everything here is request-and-reshape: quotes, symbol search, ticker
//! news and the general article feed, normalized into the shapes the
//! dashboard consumes.

pub mod client;

use serde::{Deserialize, Serialize};

use crate::news::extractor::parse_published;
use crate::news::Article;

pub use client::{KeyStatus, MarketClient};

/// A price snapshot as shown on dashboard cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: Option<f64>,
    pub changes_percentage: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_short_name: Option<String>,
}

/// One daily bar of `/historical-price-full`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub date: String,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

/// History arrives wrapped; symbols without data come back as `{}`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawHistory {
    #[serde(default)]
    pub(crate) historical: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawQuote {
    symbol: Option<String>,
    name: Option<String>,
    price: Option<f64>,
    change: Option<f64>,
    changes_percentage: Option<f64>,
}

impl RawQuote {
    /// Entries without a symbol or a numeric price are dropped.
    pub(crate) fn into_quote(self) -> Option<Quote> {
        let symbol = self.symbol.filter(|s| !s.is_empty())?;
        Some(Quote {
            name: self.name.unwrap_or_else(|| symbol.clone()),
            symbol,
            price: self.price?,
            change: self.change,
            changes_percentage: self.changes_percentage,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawSymbol {
    symbol: Option<String>,
    name: Option<String>,
    currency: Option<String>,
    exchange_short_name: Option<String>,
}

impl RawSymbol {
    pub(crate) fn into_match(self) -> Option<SymbolMatch> {
        let symbol = self.symbol.filter(|s| !s.is_empty())?;
        Some(SymbolMatch {
            name: self.name.unwrap_or_default(),
            symbol,
            currency: self.currency,
            exchange_short_name: self.exchange_short_name,
        })
    }
}

/// One item of `/stock_news`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTickerNews {
    url: Option<String>,
    title: Option<String>,
    text: Option<String>,
    image: Option<String>,
    published_date: Option<String>,
    site: Option<String>,
}

impl RawTickerNews {
    pub(crate) fn into_article(self) -> Option<Article> {
        article_from(self.url, self.title, self.text, self.image, self.published_date, self.site)
    }
}

/// `/fmp/articles` nests its items under `content`.
#[derive(Debug, Deserialize)]
pub(crate) struct RawFeedPage {
    #[serde(default)]
    pub(crate) content: Vec<RawFeedArticle>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFeedArticle {
    link: Option<String>,
    title: Option<String>,
    #[serde(alias = "content")]
    text: Option<String>,
    image: Option<String>,
    date: Option<String>,
    site: Option<String>,
}

impl RawFeedArticle {
    pub(crate) fn into_article(self) -> Option<Article> {
        article_from(self.link, self.title, self.text, self.image, self.date, self.site)
    }
}

fn article_from(
    url: Option<String>,
    title: Option<String>,
    text: Option<String>,
    image: Option<String>,
    date: Option<String>,
    site: Option<String>,
) -> Option<Article> {
    let url = url.filter(|u| !u.trim().is_empty())?;
    Some(Article {
        url,
        title: title.unwrap_or_default(),
        description: text.unwrap_or_default(),
        image_url: image.filter(|i| !i.is_empty()),
        published_time: date.as_deref().and_then(parse_published),
        site: site.unwrap_or_default(),
    })
}
