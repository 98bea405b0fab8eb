use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::errors::classify_status;
use super::streaming::{SseChunkStream, TextChunkStream};
use crate::domain::errors::TransformError;
use crate::domain::models::config::ServiceConfig;
use crate::domain::ports::{ChunkStream, TransformRequest, TransformService};

/// Configuration for the HTTP transformation service adapter
#[derive(Debug, Clone)]
pub struct HttpTransformConfig {
    /// Streaming endpoint URL
    pub endpoint: String,

    /// Bearer token, if required
    pub api_key: Option<String>,

    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// Time allowed until the response status arrives, in seconds
    pub establish_timeout_secs: u64,
}

impl From<&ServiceConfig> for HttpTransformConfig {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            connect_timeout_secs: config.connect_timeout_secs,
            establish_timeout_secs: config.establish_timeout_secs,
        }
    }
}

/// Transformation service reached over HTTP.
///
/// Sends the rewrite request as JSON and decodes the response body as it
/// arrives, either as Server-Sent Events or as raw chunked text depending on
/// the response content type.
///
/// Only connecting and receiving the response status are time-limited; the
/// body may stream for as long as the service keeps sending.
pub struct HttpTransformService {
    http_client: ReqwestClient,
    endpoint: String,
    api_key: Option<String>,
    establish_timeout: Duration,
}

impl HttpTransformService {
    pub fn new(config: HttpTransformConfig) -> Result<Self, TransformError> {
        let http_client = ReqwestClient::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .map_err(|err| TransformError::Network(format!("failed to build HTTP client: {err}")))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint,
            api_key: config.api_key,
            establish_timeout: Duration::from_secs(config.establish_timeout_secs),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, TransformError> {
        Self::new(HttpTransformConfig::from(config))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TransformService for HttpTransformService {
    fn service_name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(endpoint = %self.endpoint, action = %request.action.kind(), model = %request.model_id))]
    async fn open_stream(&self, request: &TransformRequest) -> Result<ChunkStream, TransformError> {
        let mut builder = self
            .http_client
            .post(&self.endpoint)
            .header(ACCEPT, "text/event-stream, text/plain")
            .json(request);

        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = tokio::time::timeout(self.establish_timeout, builder.send())
            .await
            .map_err(|_| TransformError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let body = match tokio::time::timeout(self.establish_timeout, response.text()).await {
                Ok(Ok(body)) => body,
                Ok(Err(_)) => "Unable to read error body".to_string(),
                Err(_) => "Error body not received in time".to_string(),
            };
            warn!(%status, %body, "Transform service refused the request");
            return Err(classify_status(status, body));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/event-stream"));

        debug!(sse = is_sse, "Transform stream established");

        let body = response.bytes_stream();
        let stream = if is_sse {
            SseChunkStream::new(body).boxed()
        } else {
            TextChunkStream::new(body).boxed()
        };
        Ok(stream)
    }
}
