use crate::error::{Error, Result};
use crate::news::extractor::ArticleExtractor;
use crate::news::sitemap::{Sitemap, SitemapParser};
use crate::news::Article;
use reqwest::{Client, Response};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Index documents followed per top-level sitemap.
const MAX_CHILD_SITEMAPS: usize = 10;

#[derive(Debug, Clone)]
pub struct ArticleFetcher {
    client: Client,
    timeout_duration: Duration,
    user_agent: String,
}

impl ArticleFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .gzip(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            timeout_duration: Duration::from_secs(10),
            user_agent: format!("finboard/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_duration = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// First `limit` page URLs of a sitemap, in document order.
    ///
    /// A sitemap index is followed one child at a time until `limit` URLs
    /// are gathered. Only the top-level document has to succeed; a failing
    /// child is logged and skipped.
    pub async fn list_candidate_urls(&self, sitemap_url: &str, limit: usize) -> Result<Vec<String>> {
        let mut urls = match self.fetch_sitemap(sitemap_url).await? {
            Sitemap::Urls(urls) => urls,
            Sitemap::Index(children) => {
                let mut urls = Vec::new();
                for child in children.iter().take(MAX_CHILD_SITEMAPS) {
                    if urls.len() >= limit {
                        break;
                    }
                    match self.fetch_sitemap(child).await {
                        Ok(Sitemap::Urls(found)) => urls.extend(found),
                        Ok(Sitemap::Index(_)) => {
                            warn!("Nested sitemap index at {} ignored", child);
                        }
                        Err(e) => {
                            warn!("Child sitemap {} failed: {}", child, e);
                        }
                    }
                }
                urls
            }
        };

        urls.truncate(limit);
        debug!("{} candidate URLs from {}", urls.len(), sitemap_url);
        Ok(urls)
    }

    /// Fetch one page and run the source's extractor over it.
    ///
    /// Every failure, from transport errors to missing fields, comes back as
    /// `None` so a bad page never aborts a batch.
    pub async fn extract_article(
        &self,
        page_url: &str,
        site: &str,
        extractor: &dyn ArticleExtractor,
    ) -> Option<Article> {
        let body = match self.fetch_text(page_url, "text/html, application/xhtml+xml, */*").await {
            Ok(body) => body,
            Err(e) => {
                debug!("Skipping {}: {}", page_url, e);
                return None;
            }
        };

        match extractor.extract(page_url, &body) {
            Some(fields) => Some(Article::from_page(page_url, site, fields)),
            None => {
                debug!("Skipping {}: required fields missing", page_url);
                None
            }
        }
    }

    async fn fetch_sitemap(&self, url: &str) -> Result<Sitemap> {
        debug!("Fetching sitemap from: {}", url);
        let body = self
            .fetch_text(url, "application/xml, text/xml, */*")
            .await?;
        SitemapParser::new().parse(&body).map_err(|e| match e {
            Error::MalformedUpstreamPayload(msg) => {
                Error::UpstreamUnavailable(format!("Unusable sitemap at {}: {}", url, msg))
            }
            other => other,
        })
    }

    async fn fetch_text(&self, url: &str, accept: &str) -> Result<String> {
        validate_url(url)?;

        let response = timeout(self.timeout_duration, self.fetch_response(url, accept))
            .await
            .map_err(|_| Error::UpstreamUnavailable(format!("Request to {} timed out", url)))??;

        if !response.status().is_success() {
            return Err(Error::UpstreamUnavailable(format!(
                "HTTP {} for {}: {}",
                response.status().as_u16(),
                url,
                response.status().canonical_reason().unwrap_or("Unknown error")
            )));
        }

        let body = timeout(self.timeout_duration, response.text())
            .await
            .map_err(|_| Error::UpstreamUnavailable(format!("Reading body of {} timed out", url)))?
            .map_err(|e| Error::UpstreamUnavailable(format!("Failed to read response body: {}", e)))?;

        debug!("Downloaded {} bytes from {}", body.len(), url);
        Ok(body)
    }

    async fn fetch_response(&self, url: &str, accept: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", accept)
            .send()
            .await
            .map_err(|e| Error::UpstreamUnavailable(format!("Request failed: {}", e)))?;

        Ok(response)
    }
}

pub fn validate_url(url: &str) -> Result<()> {
    let parsed_url = url::Url::parse(url)
        .map_err(|e| Error::InvalidUrl(format!("Invalid URL: {}", e)))?;

    match parsed_url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(Error::InvalidUrl(format!("Unsupported scheme: {}", scheme))),
    }
}
