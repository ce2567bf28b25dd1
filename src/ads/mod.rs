//! Read-through cache over an external product feed, served as ads.
//!
//! One shared slot, time-boxed by a TTL. A failed refresh falls back to
//! whatever the slot already holds; only an empty slot surfaces the
//! upstream failure to the caller.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::AdsConfig;

/// Ad shape returned to clients, mapped from the upstream product feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ad {
    pub id: i64,
    pub title: String,
    pub image: String,
    pub link: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    pub rating: serde_json::Value,
}

/// Upstream product record. Only the fields we map are decoded.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    pub image: String,
    pub price: f64,
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub rating: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum AdSourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream responded {0}")]
    Status(u16),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Port for the upstream feed, so tests can substitute a scripted source.
#[async_trait]
pub trait AdSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<Product>, AdSourceError>;
}

/// Reqwest-backed source. Owns transport details only: timeout, status
/// mapping, JSON decode.
pub struct HttpAdSource {
    client: reqwest::Client,
    url: String,
}

impl HttpAdSource {
    pub fn new(url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl AdSource for HttpAdSource {
    async fn fetch(&self) -> Result<Vec<Product>, AdSourceError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AdSourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdSourceError::Status(status.as_u16()));
        }

        response
            .json::<Vec<Product>>()
            .await
            .map_err(|e| AdSourceError::Decode(e.to_string()))
    }
}

fn map_ads(products: Vec<Product>) -> Vec<Ad> {
    products
        .into_iter()
        .map(|p| Ad {
            link: format!("https://fakestoreapi.com/products/{}", p.id),
            id: p.id,
            title: p.title,
            image: p.image,
            price: p.price,
            description: p.description,
            category: p.category,
            rating: p.rating,
        })
        .collect()
}

struct Slot {
    ads: Vec<Ad>,
    expires_at: Instant,
}

/// Single-slot TTL cache in front of an [`AdSource`].
pub struct AdsCache {
    source: Box<dyn AdSource>,
    ttl: Duration,
    slot: Mutex<Option<Slot>>,
}

impl AdsCache {
    pub fn new(source: Box<dyn AdSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AdsConfig) -> Result<Self, reqwest::Error> {
        let source = HttpAdSource::new(
            config.upstream_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )?;
        Ok(Self::new(
            Box::new(source),
            Duration::from_secs(config.cache_ttl_secs),
        ))
    }

    /// Serve from the slot while fresh; otherwise refresh from upstream,
    /// falling back to stale data when the refresh fails.
    ///
    /// The lock is released around the upstream call, so concurrent
    /// callers hitting a stale slot may each fetch. The overwrite is
    /// idempotent.
    pub async fn get(&self) -> Result<Vec<Ad>, AdSourceError> {
        {
            let slot = self.slot.lock().await;
            if let Some(s) = slot.as_ref() {
                if Instant::now() < s.expires_at {
                    return Ok(s.ads.clone());
                }
            }
        }

        match self.source.fetch().await {
            Ok(products) => {
                let ads = map_ads(products);
                let mut slot = self.slot.lock().await;
                *slot = Some(Slot {
                    ads: ads.clone(),
                    expires_at: Instant::now() + self.ttl,
                });
                Ok(ads)
            }
            Err(e) => {
                // Stale data beats no data; the slot keeps its expired
                // contents so the next request retries upstream.
                let slot = self.slot.lock().await;
                match slot.as_ref() {
                    Some(s) => {
                        tracing::warn!("Ads refresh failed, serving stale cache: {}", e);
                        Ok(s.ads.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }
}
