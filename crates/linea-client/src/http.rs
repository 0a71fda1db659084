//! HTTP implementation of [`LineageApi`].
//!
//! # Endpoints
//!
//! - `GET {base}/lineage/table/{id}/{upstream|downstream}?depth=&granularity=field`
//! - `GET {base}/lineage/graph?table_id=&direction=both&depth=`
//! - `GET {base}/lineage/trace/field/{field_id}?direction=both&depth=5`
//! - `DELETE {base}/lineage/{relationship_id}`
//! - `GET {base}/tables?page=&size=`
//!
//! Connection failures, timeouts and 5xx answers are retried with exponential
//! backoff; 4xx answers fail immediately.

use std::time::Duration;

use async_trait::async_trait;
use linea_config::ApiConfig;
use linea_core::{LineageDirection, LineageGraphResponse, TraceResult};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::traits::LineageApi;
use crate::types::{GraphRequest, TablePage};

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Traversal depth requested for field traces
const TRACE_DEPTH: u32 = 5;

/// Lineage service client over HTTP.
#[derive(Clone)]
pub struct HttpLineageApi {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpLineageApi {
    /// Create a client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            linea_config::ConfigError::invalid_value("api.base_url", e.to_string())
        })?;
        if base_url.cannot_be_a_base() {
            return Err(linea_config::ConfigError::invalid_value(
                "api.base_url",
                format!("'{}' cannot carry a path", config.base_url),
            )
            .into());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ClientError::connection(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    /// Set the initial backoff delay between retries.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// URL of a neighbourhood fetch for `request`.
    pub fn graph_url(&self, request: &GraphRequest) -> Url {
        let depth = request.depth.to_string();
        match request.direction {
            LineageDirection::Upstream | LineageDirection::Downstream => {
                let mut url = self.endpoint(&[
                    "lineage",
                    "table",
                    &request.table_id,
                    request.direction.as_str(),
                ]);
                url.query_pairs_mut()
                    .append_pair("depth", &depth)
                    .append_pair("granularity", "field");
                url
            }
            LineageDirection::Both => {
                let mut url = self.endpoint(&["lineage", "graph"]);
                url.query_pairs_mut()
                    .append_pair("table_id", &request.table_id)
                    .append_pair("direction", "both")
                    .append_pair("depth", &depth);
                url
            }
        }
    }

    /// Send a request with retry logic.
    ///
    /// `build` is called once per attempt since a `RequestBuilder` is consumed on send.
    async fn send_with_retry<F>(&self, build: F) -> Result<Response, ClientError>
    where
        F: Fn() -> RequestBuilder + Send + Sync,
    {
        let mut retry_delay = self.retry_delay;

        for attempt in 0..=self.max_retries {
            match self.send_once(build()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(
                        "Lineage request failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries + 1,
                        e,
                        retry_delay
                    );
                    tokio::time::sleep(retry_delay).await;
                    retry_delay *= 2;
                }
                Err(e) => return Err(e),
            }
        }

        Err(ClientError::connection("request failed after retries"))
    }

    /// Send a single request and map the status to an error.
    async fn send_once(&self, mut request: RequestBuilder) -> Result<Response, ClientError> {
        if let Some(ref api_key) = self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout
            } else if e.is_connect() {
                ClientError::connection(format!("Connection failed: {}", e))
            } else {
                ClientError::connection(format!("Request failed: {}", e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let resource = response.url().path().to_string();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::not_found(resource)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(ClientError::Unauthorized(format!("{}: {}", status, body)))
            }
            _ => Err(ClientError::server(status.as_u16(), body)),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ClientError> {
        debug!("GET {}", url);
        let response = self.send_with_retry(|| self.client.get(url.clone())).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl LineageApi for HttpLineageApi {
    async fn fetch_graph(
        &self,
        request: &GraphRequest,
    ) -> Result<LineageGraphResponse, ClientError> {
        let graph: LineageGraphResponse = self.get_json(self.graph_url(request)).await?;
        debug!(
            "Fetched {} nodes, {} edges for '{}' ({}, depth {})",
            graph.nodes.len(),
            graph.edges.len(),
            request.table_id,
            request.direction,
            request.depth
        );
        Ok(graph)
    }

    async fn trace_field(&self, field_id: &str) -> Result<TraceResult, ClientError> {
        let mut url = self.endpoint(&["lineage", "trace", "field", field_id]);
        url.query_pairs_mut()
            .append_pair("direction", "both")
            .append_pair("depth", &TRACE_DEPTH.to_string());
        self.get_json(url).await
    }

    async fn delete_relationship(&self, relationship_id: &str) -> Result<(), ClientError> {
        let url = self.endpoint(&["lineage", relationship_id]);
        debug!("DELETE {}", url);
        self.send_with_retry(|| self.client.delete(url.clone()))
            .await?;
        Ok(())
    }

    async fn list_tables(&self, page: u64, size: u64) -> Result<TablePage, ClientError> {
        let mut url = self.endpoint(&["tables"]);
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        self.get_json(url).await
    }
}

impl std::fmt::Debug for HttpLineageApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLineageApi")
            .field("base_url", &self.base_url.as_str())
            .field("authenticated", &self.api_key.is_some())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
