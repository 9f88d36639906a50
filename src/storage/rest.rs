use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::traits::KeyValueStore;

/// Hosted Redis-compatible store reached through its REST interface
/// (`GET /get/{key}`, `POST /set/{key}?EX=secs`, bearer
/// token auth). Responses wrap the payload as `{"result": ...}`.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RestReply<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

impl RestStore {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, command: &str, key: &str) -> Result<url::Url> {
        let mut url = url::Url::parse(&self.base_url)
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .push(command)
            .push(key);
        Ok(url)
    }

    async fn reply<T: serde::de::DeserializeOwned>(&self, response: reqwest::Response) -> Result<Option<T>> {
        let status = response.status();
        let body = response.text().await?;

        let reply: RestReply<T> = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                Error::Storage(format!("Unexpected store reply: {}", e))
            } else {
                Error::Storage(format!("Store returned HTTP {}", status.as_u16()))
            }
        })?;

        if let Some(err) = reply.error {
            return Err(Error::Storage(err));
        }
        if !status.is_success() {
            return Err(Error::Storage(format!("Store returned HTTP {}", status.as_u16())));
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl KeyValueStore for RestStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url("get", key)?)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Store request failed: {}", e)))?;

        let value: Option<String> = self.reply(response).await?;
        debug!(key, hit = value.is_some(), "Store get");
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut url = self.url("set", key)?;
        url.query_pairs_mut()
            .append_pair("EX", &ttl.as_secs().max(1).to_string());

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .body(value)
            .send()
            .await
            .map_err(|e| Error::Storage(format!("Store request failed: {}", e)))?;

        let _: Option<String> = self.reply(response).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}
