use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::error::{Error, Result};
use crate::market::{
    PricePoint, Quote, RawFeedArticle, RawFeedPage, RawHistory, RawQuote, RawSymbol, RawTickerNews, SymbolMatch,
};
use crate::news::Article;

pub const API_KEY_VAR: &str = "FMP_API_KEY";

#[derive(Debug, Clone)]
pub struct MarketClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Outcome of probing the configured API key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyStatus {
    pub accepted: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_response: Option<String>,
}

impl MarketClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    pub fn from_config(config: &MarketConfig, timeout: Duration) -> Result<Self> {
        Self::new(&config.base_url, config.api_key.clone(), timeout)
    }

    pub fn has_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Quotes for the given symbols, in upstream order.
    pub async fn quotes(&self, symbols: &[String]) -> Result<Vec<Quote>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<RawQuote> = self
            .get_json(&["quote", &symbols.join(",")], &[])
            .await?;
        Ok(raw.into_iter().filter_map(RawQuote::into_quote).collect())
    }

    pub async fn quote(&self, symbol: &str) -> Result<Option<Quote>> {
        Ok(self.quotes(&[symbol.to_string()]).await?.into_iter().next())
    }

    /// Name and symbol search, optionally restricted to exchanges such as
    /// `NASDAQ,NYSE` or `CRYPTO`.
    pub async fn search(&self, query: &str, limit: usize, exchange: Option<&str>) -> Result<Vec<SymbolMatch>> {
        let limit = limit.to_string();
        let mut params = vec![("query", query), ("limit", limit.as_str())];
        if let Some(exchange) = exchange {
            params.push(("exchange", exchange));
        }
        let raw: Vec<RawSymbol> = self.get_json(&["search"], &params).await?;
        Ok(raw.into_iter().filter_map(RawSymbol::into_match).collect())
    }

    pub async fn search_tickers(&self, query: &str, limit: usize) -> Result<Vec<SymbolMatch>> {
        let limit = limit.to_string();
        let raw: Vec<RawSymbol> = self
            .get_json(&["search-ticker"], &[("query", query), ("limit", limit.as_str())])
            .await?;
        Ok(raw.into_iter().filter_map(RawSymbol::into_match).collect())
    }

    pub async fn most_active(&self, limit: usize) -> Result<Vec<Quote>> {
        let limit = limit.to_string();
        let raw: Vec<RawQuote> = self
            .get_json(&["stock_market", "actives"], &[("limit", limit.as_str())])
            .await?;
        Ok(raw.into_iter().filter_map(RawQuote::into_quote).collect())
    }

    /// Daily bars, newest first, for the last `days` trading days.
    pub async fn history(&self, symbol: &str, days: usize) -> Result<Vec<PricePoint>> {
        let days = days.to_string();
        let raw: RawHistory = self
            .get_json(&["historical-price-full", symbol], &[("timeseries", days.as_str())])
            .await?;
        Ok(raw.historical)
    }

    /// Latest news for one or more tickers, reshaped into articles.
    pub async fn ticker_news(&self, symbols: &[String], limit: usize) -> Result<Vec<Article>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let tickers = symbols.join(",");
        let limit = limit.to_string();
        let raw: Vec<RawTickerNews> = self
            .get_json(&["stock_news"], &[("tickers", tickers.as_str()), ("limit", limit.as_str())])
            .await?;
        Ok(raw.into_iter().filter_map(RawTickerNews::into_article).collect())
    }

    /// The provider's own editorial feed.
    pub async fn general_articles(&self, page: usize, size: usize) -> Result<Vec<Article>> {
        let page = page.to_string();
        let size = size.to_string();
        let raw: RawFeedPage = self
            .get_json(&["fmp", "articles"], &[("page", page.as_str()), ("size", size.as_str())])
            .await?;
        Ok(raw.content.into_iter().filter_map(RawFeedArticle::into_article).collect())
    }

    /// Probe the key with a cheap profile lookup.
    pub async fn check_key(&self) -> Result<KeyStatus> {
        match self.get_json::<Vec<Value>>(&["profile", "AAPL"], &[]).await {
            Ok(_) => Ok(KeyStatus {
                accepted: true,
                message: "API key is configured and accepted by the provider".to_string(),
                api_response: None,
            }),
            Err(Error::UpstreamUnavailable(msg)) => Ok(KeyStatus {
                accepted: false,
                message: "API key is present but the provider rejected the request".to_string(),
                api_response: Some(msg),
            }),
            Err(e) => Err(e),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<T> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ConfigMissing(format!("{} is not set", API_KEY_VAR)))?;

        let url = self.endpoint(segments)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .query(params)
            .query(&[("apikey", api_key)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let value: Option<Value> = serde_json::from_str(&body).ok();

        // The provider reports some failures as 200 with an error object.
        let upstream_message = value
            .as_ref()
            .and_then(|v| v.get("Error Message"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if !status.is_success() || upstream_message.is_some() {
            let message = upstream_message
                .unwrap_or_else(|| format!("market data API failed with status: {}", status.as_u16()));
            warn!("Market data request to /{} failed: {}", segments.join("/"), message);
            return Err(Error::UpstreamUnavailable(message));
        }

        let value = value.ok_or_else(|| {
            Error::MalformedUpstreamPayload(format!("/{} did not return JSON", segments.join("/")))
        })?;

        serde_json::from_value(value).map_err(|e| {
            Error::MalformedUpstreamPayload(format!("/{}: {}", segments.join("/"), e))
        })
    }
}
