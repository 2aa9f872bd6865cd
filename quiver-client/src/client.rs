//! HTTP implementation of [`ClusterApi`]

use crate::api::ClusterApi;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::models::*;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

/// Header carrying the API key
const API_KEY_HEADER: &str = "api-key";

/// Client for a cluster's HTTP API
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct QuiverClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl QuiverClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: Url::parse(config.url.trim_end_matches('/'))?,
            api_key: config.api_key.clone(),
        })
    }

    /// Create a client for `url` with default settings
    pub fn from_url(url: &str) -> Result<Self> {
        Self::new(&ClientConfig::new(url))
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL, percent-encoding each path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!("{} cannot be used as a base URL", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and unwrap the response envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let (status, envelope) = self.send_for_envelope(request, what).await?;
        envelope.result.ok_or_else(|| ClientError::Api {
            status,
            message: format!("{} returned no result", what),
        })
    }

    /// Send a request and return the envelope of a successful response
    ///
    /// Non-2xx responses and error statuses become [`ClientError::Api`].
    async fn send_for_envelope<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<(u16, ApiResponse<T>)> {
        let request = match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiResponse<serde_json::Value>>(&body)
                .ok()
                .and_then(|envelope| envelope.status.error_message().map(str::to_string))
                .unwrap_or(body);
            debug!("{} failed ({}): {}", what, status, message);
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiResponse<T> = response.json().await?;
        if let Some(message) = envelope.status.error_message() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        Ok((status.as_u16(), envelope))
    }
}

#[async_trait]
impl ClusterApi for QuiverClient {
    async fn list_collections(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["collections"])?;
        debug!("GET {}", url);

        let response: CollectionsResponse =
            self.send(self.client.get(url), "list collections").await?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn get_collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        let url = self.endpoint(&["collections", collection])?;
        debug!("GET {}", url);

        self.send(self.client.get(url), "get collection info").await
    }

    async fn get_collection_cluster_info(
        &self,
        collection: &str,
    ) -> Result<CollectionClusterInfo> {
        let url = self.endpoint(&["collections", collection, "cluster"])?;
        debug!("GET {}", url);

        self.send(self.client.get(url), "get collection clustering info")
            .await
    }

    async fn update_collection_cluster_setup(
        &self,
        collection: &str,
        operation: &ClusterOperation,
    ) -> Result<UpdateAck> {
        let what = "update collection clustering setup";
        let url = self.endpoint(&["collections", collection, "cluster"])?;
        debug!("POST {} {:?}", url, operation);

        let (status, envelope) = self
            .send_for_envelope::<bool>(self.client.post(url).json(operation), what)
            .await?;
        let accepted = envelope.result.ok_or_else(|| ClientError::Api {
            status,
            message: format!("{} returned no result", what),
        })?;

        Ok(UpdateAck {
            accepted,
            status: envelope.status.as_str().to_string(),
        })
    }

    async fn get_cluster_info(&self) -> Result<ClusterInfo> {
        let url = self.endpoint(&["cluster"])?;
        debug!("GET {}", url);

        self.send(self.client.get(url), "get cluster info").await
    }
}
