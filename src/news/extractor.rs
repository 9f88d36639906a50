//! Field extraction from article pages.
//!
//! Each [`Source`](crate::news::Source) carries an [`ArticleExtractor`]. The
//! stock implementation, [`SelectorExtractor`], applies one [`FieldRule`] per
//! field. A rule picks the first element matching its tag, class and
//! attribute constraints and reads either an attribute or the element text.
//! Title, description and image are required; when any is missing the page
//! yields nothing.

use chrono::{DateTime, Utc};
use regex::Regex;
use select::document::Document;
use select::node::Node;
use select::predicate::{Any, Attr, Class, Name, Predicate};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{Error, Result};

/// Fields lifted from one page, before the article gets its URL and site.
#[derive(Debug, Clone, PartialEq)]
pub struct PageFields {
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub published_time: Option<DateTime<Utc>>,
}

pub trait ArticleExtractor: Send + Sync + fmt::Debug {
    /// Returns `None` unless every required field is present.
    fn extract(&self, page_url: &str, html: &str) -> Option<PageFields>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrMatch {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_attr: Option<AttrMatch>,
    /// Attribute to read. The element's text is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRules {
    pub title: FieldRule,
    pub description: FieldRule,
    pub image: FieldRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<FieldRule>,
}

impl FieldRule {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    pub fn meta(key: &str, value: &str) -> Self {
        Self {
            tag: Some("meta".to_string()),
            class: None,
            match_attr: Some(AttrMatch {
                name: key.to_string(),
                value: value.to_string(),
            }),
            attr: Some("content".to_string()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.tag.is_none() && self.class.is_none() && self.match_attr.is_none() {
            return Err(Error::Invalid("Field rule needs a tag, class or match_attr".to_string()));
        }
        Ok(())
    }

    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if !Name(tag.as_str()).matches(node) {
                return false;
            }
        }
        if let Some(class) = &self.class {
            if !Class(class.as_str()).matches(node) {
                return false;
            }
        }
        if let Some(m) = &self.match_attr {
            if !Attr(m.name.as_str(), m.value.as_str()).matches(node) {
                return false;
            }
        }
        true
    }

    /// Value of the first matching element, whitespace-collapsed. Empty
    /// values count as missing.
    fn apply(&self, doc: &Document, whitespace: &Regex) -> Option<String> {
        let node = doc.find(Any).find(|n| n.name().is_some() && self.matches(n))?;
        let raw = match &self.attr {
            Some(attr) => node.attr(attr.as_str())?.to_string(),
            None => node.text(),
        };
        let value = whitespace.replace_all(raw.trim(), " ").into_owned();
        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

impl ExtractionRules {
    /// Built-in rule sets, looked up by name from the config file.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "reuters" => Some(Self {
                title: FieldRule::tag("h1"),
                description: FieldRule::meta("name", "description"),
                image: FieldRule::meta("property", "og:image"),
                published: Some(FieldRule::meta("property", "article:published_time")),
            }),
            "open-graph" => Some(Self {
                title: FieldRule::meta("property", "og:title"),
                description: FieldRule::meta("property", "og:description"),
                image: FieldRule::meta("property", "og:image"),
                published: Some(FieldRule::meta("property", "article:published_time")),
            }),
            _ => None,
        }
    }

    pub fn preset_names() -> &'static [&'static str] {
        &["reuters", "open-graph"]
    }

    pub fn validate(&self) -> Result<()> {
        self.title.validate()?;
        self.description.validate()?;
        self.image.validate()?;
        if let Some(published) = &self.published {
            published.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    rules: ExtractionRules,
    whitespace: Regex,
}

impl SelectorExtractor {
    pub fn new(rules: ExtractionRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self {
            rules,
            whitespace: Regex::new(r"\s+").map_err(|e| Error::Invalid(e.to_string()))?,
        })
    }
}

impl ArticleExtractor for SelectorExtractor {
    fn extract(&self, page_url: &str, html: &str) -> Option<PageFields> {
        let doc = Document::from(html);

        let title = self.rules.title.apply(&doc, &self.whitespace)?;
        let description = self.rules.description.apply(&doc, &self.whitespace)?;
        let image = self.rules.image.apply(&doc, &self.whitespace)?;
        let published_time = self
            .rules
            .published
            .as_ref()
            .and_then(|rule| rule.apply(&doc, &self.whitespace))
            .and_then(|raw| parse_published(&raw));

        Some(PageFields {
            title,
            description,
            image_url: resolve_url(page_url, &image),
            published_time,
        })
    }
}

/// Relative image paths are resolved against the page URL.
fn resolve_url(page_url: &str, href: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // FMP style: "2024-03-15 10:00:00"
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
