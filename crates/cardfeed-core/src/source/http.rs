//! Remote sources reached over HTTP.
//!
//! `GET {base_url}/{collection}[/{id}]?projection=a,b,c&sort=col ASC` returns a
//! JSON array of rows. Notifications arrive out of band through the
//! [`NotificationHub`].

use async_trait::async_trait;
use cardfeed_types::models::SourceEndpointConfig;
use cardfeed_types::{Collection, FeedConfig, Row, SourceError};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::{
    DataSource, NotificationHub, QueryRequest, SourceCandidate, SourceProvider, SourceResult,
    Subscription,
};
use crate::dispatcher::NotificationSink;
use crate::error::FeedResult;

pub struct HttpDataSource {
    source_id: String,
    base_url: Url,
    client: reqwest::Client,
    hub: NotificationHub,
    timeout: Duration,
}

impl HttpDataSource {
    pub fn new(
        source_id: impl Into<String>,
        base_url: Url,
        hub: NotificationHub,
        timeout: Duration,
    ) -> FeedResult<Self> {
        let client = build_client(timeout)?;
        Ok(Self::with_client(source_id, base_url, hub, client, timeout))
    }

    /// Share one connection pool across sources. The client should carry
    /// `timeout` as its request timeout.
    pub fn with_client(
        source_id: impl Into<String>,
        base_url: Url,
        hub: NotificationHub,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self { source_id: source_id.into(), base_url, client, hub, timeout }
    }

    /// Endpoint for `request`, or `None` if the base URL cannot carry a path.
    pub fn endpoint(&self, request: &QueryRequest) -> Option<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut().ok()?.pop_if_empty().extend(request.uri.segments());
        url.query_pairs_mut()
            .append_pair("projection", &request.projection.join(","))
            .append_pair("sort", &request.sort.to_string());
        Some(url)
    }

    fn map_error(&self, e: reqwest::Error) -> SourceError {
        if e.is_timeout() {
            SourceError::Timeout {
                source_id: self.source_id.clone(),
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else if e.is_decode() {
            SourceError::malformed("<body>", e.to_string())
        } else {
            SourceError::Unreachable { source_id: self.source_id.clone(), message: e.to_string() }
        }
    }
}

#[async_trait]
impl DataSource for HttpDataSource {
    async fn query(&self, request: &QueryRequest) -> SourceResult<Vec<Row>> {
        let unsupported = || SourceError::Unsupported { uri: request.uri.to_string() };
        if request.uri.authority() != self.source_id {
            return Err(unsupported());
        }
        let url = self.endpoint(request).ok_or_else(unsupported)?;

        tracing::debug!("GET {} for {}", url, request.uri);
        let response = self.client.get(url).send().await.map_err(|e| self.map_error(e))?;

        match response.status() {
            // Item is gone; same as an empty result.
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                response.json::<Vec<Row>>().await.map_err(|e| self.map_error(e))
            },
            status => Err(SourceError::Http {
                source_id: self.source_id.clone(),
                status: status.as_u16(),
            }),
        }
    }

    async fn subscribe(
        &self,
        collection: Collection,
        sink: NotificationSink,
    ) -> SourceResult<Subscription> {
        if sink.is_closed() {
            return Err(SourceError::Subscription {
                source_id: self.source_id.clone(),
                message: "dispatcher is not running".to_string(),
            });
        }
        Ok(self.hub.register(&self.source_id, collection, sink))
    }
}

impl std::fmt::Debug for HttpDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDataSource")
            .field("source_id", &self.source_id)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Provider over the `sources` list of the config file.
pub struct HttpSourceProvider {
    entries: Vec<SourceEndpointConfig>,
    client: reqwest::Client,
    hub: NotificationHub,
    timeout: Duration,
}

impl HttpSourceProvider {
    pub fn new(config: &FeedConfig, hub: NotificationHub) -> FeedResult<Self> {
        let timeout = config.fetch_timeout();
        Ok(Self { entries: config.sources.clone(), client: build_client(timeout)?, hub, timeout })
    }
}

#[async_trait]
impl SourceProvider for HttpSourceProvider {
    async fn enumerate(&self) -> Vec<SourceResult<SourceCandidate>> {
        self.entries
            .iter()
            .map(|entry| {
                let base_url = Url::parse(&entry.base_url).map_err(|e| SourceError::Discovery {
                    candidate: entry.source_id.clone(),
                    message: format!("invalid base url {}: {}", entry.base_url, e),
                })?;
                if base_url.cannot_be_a_base() {
                    return Err(SourceError::Discovery {
                        candidate: entry.source_id.clone(),
                        message: format!("base url {} cannot carry a path", entry.base_url),
                    });
                }

                let client = HttpDataSource::with_client(
                    entry.source_id.clone(),
                    base_url,
                    self.hub.clone(),
                    self.client.clone(),
                    self.timeout,
                );
                Ok(SourceCandidate {
                    source_id: entry.source_id.clone(),
                    read_capability: entry.read_permission.clone(),
                    write_capability: entry.write_permission.clone(),
                    client: Arc::new(client),
                })
            })
            .collect()
    }
}

fn build_client(timeout: Duration) -> FeedResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cardfeed_types::SourceDescriptor;

    #[test]
    fn test_endpoint_layout() {
        let source = HttpDataSource::new(
            "com.example.feed",
            Url::parse("http://localhost:9000/feed/").unwrap(),
            NotificationHub::new(),
            Duration::from_secs(1),
        )
        .unwrap();
        let descriptor = SourceDescriptor::new("com.example.feed").unwrap();

        let url = source.endpoint(&QueryRequest::card_item(descriptor.cards_uri.item(7))).unwrap();
        assert_eq!(url.path(), "/feed/datacard/7");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[1], ("sort".to_string(), "date_created ASC".to_string()));
        assert!(pairs[0].1.starts_with("_id,"));
    }

    #[tokio::test]
    async fn test_provider_reports_bad_entries() {
        let mut config = FeedConfig::new();
        config.sources = vec![
            SourceEndpointConfig {
                source_id: "com.example.good".to_string(),
                base_url: "http://localhost:9000".to_string(),
                read_permission: Some("r".to_string()),
                write_permission: Some("w".to_string()),
            },
            SourceEndpointConfig {
                source_id: "com.example.bad".to_string(),
                base_url: "not a url".to_string(),
                read_permission: None,
                write_permission: None,
            },
        ];

        let provider = HttpSourceProvider::new(&config, NotificationHub::new()).unwrap();
        let candidates = provider.enumerate().await;
        assert_eq!(candidates.len(), 2);
        let good = candidates[0].as_ref().unwrap();
        assert_eq!(good.read_capability.as_deref(), Some("r"));
        assert!(matches!(candidates[1], Err(SourceError::Discovery { .. })));
    }
}
