use serde::Deserialize;

use crate::error::{Error, Result};

/// A parsed sitemap document: either a page list or an index of child sitemaps.
#[derive(Debug, Clone, PartialEq)]
pub enum Sitemap {
    Urls(Vec<String>),
    Index(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct SitemapDocument {
    #[serde(rename = "url", default)]
    urls: Vec<Location>,
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct Location {
    #[serde(default)]
    loc: Option<String>,
}

pub struct SitemapParser;

impl Default for SitemapParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SitemapParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a `<urlset>` or `<sitemapindex>` document. Locations keep
    /// document order; blank `<loc>` entries are dropped.
    pub fn parse(&self, body: &str) -> Result<Sitemap> {
        let is_index = body.contains("<sitemapindex");
        if !is_index && !body.contains("<urlset") {
            return Err(Error::MalformedUpstreamPayload(
                "Document is not a sitemap (no <urlset> or <sitemapindex>)".to_string(),
            ));
        }

        let doc: SitemapDocument = quick_xml::de::from_str(body)
            .map_err(|e| Error::MalformedUpstreamPayload(format!("Failed to parse sitemap: {}", e)))?;

        if is_index {
            Ok(Sitemap::Index(locations(doc.sitemaps)))
        } else {
            Ok(Sitemap::Urls(locations(doc.urls)))
        }
    }
}

fn locations(entries: Vec<Location>) -> Vec<String> {
    entries
        .into_iter()
        .filter_map(|entry| entry.loc)
        .map(|loc| loc.trim().to_string())
        .filter(|loc| !loc.is_empty())
        .collect()
}
