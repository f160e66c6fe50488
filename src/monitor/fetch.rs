// src/monitor/fetch.rs
//! Page fetch boundary. Rendering a dynamic sales page is someone else's
//! problem; we call a headless render service that returns the sector
//! elements it scraped as a JSON array of `RawSector`.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::errors::FetchError;
use crate::monitor::types::{MonitoredEvent, RawSector};

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_sectors(&self, event: &MonitoredEvent) -> Result<Vec<RawSector>, FetchError>;
    fn name(&self) -> &'static str;
}

/// HTTP client for the render service. The service loads the event page in a
/// headless browser, waits for the venue map to settle and returns the raw
/// sector elements.
pub struct RenderServiceFetcher {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl RenderServiceFetcher {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl PageFetcher for RenderServiceFetcher {
    async fn fetch_sectors(&self, event: &MonitoredEvent) -> Result<Vec<RawSector>, FetchError> {
        let request = self
            .client
            .get(&self.endpoint)
            .query(&[("url", event.url.as_str())])
            .timeout(self.timeout)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => return Err(FetchError::Timeout(self.timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(FetchError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(FetchError::Http(e)),
            Ok(Ok(resp)) => resp.error_for_status()?,
        };

        let body = response.text().await?;
        let sectors: Vec<RawSector> = serde_json::from_str(&body)
            .map_err(|e| FetchError::Malformed(format!("{e} (body head: {:.120})", body)))?;
        Ok(sectors)
    }

    fn name(&self) -> &'static str {
        "render-service"
    }
}

/// Canned descriptors keyed by event id. Used by tests and the demo binary;
/// unknown events fetch as empty batches.
#[derive(Default)]
pub struct FixtureFetcher {
    by_event: HashMap<String, Vec<RawSector>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON fixture (array of raw sector objects) for one event.
    pub fn with_fixture(mut self, event_id: &str, json: &str) -> Result<Self> {
        let sectors: Vec<RawSector> = serde_json::from_str(json)?;
        self.by_event.insert(event_id.to_string(), sectors);
        Ok(self)
    }

    pub fn with_sectors(mut self, event_id: &str, sectors: Vec<RawSector>) -> Self {
        self.by_event.insert(event_id.to_string(), sectors);
        self
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch_sectors(&self, event: &MonitoredEvent) -> Result<Vec<RawSector>, FetchError> {
        Ok(self.by_event.get(&event.id).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
