use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{HarnessError, ServiceError};
use crate::service::{ChunkStream, GenerationRequest, GenerationService};

use super::config::HttpServiceConfig;

const HTTP_SERVICE: &str = "http";

/// Generation service reached over HTTP; the response body is the frame
/// stream consumed by `StreamDecoder`.
pub struct HttpGenerationService {
    client: reqwest::Client,
    config: HttpServiceConfig,
}

impl HttpGenerationService {
    pub fn new(config: HttpServiceConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "generation service api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a service using `DOCFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(HttpServiceConfig::from_env()?)
    }

    async fn open_once(&self, body: &serde_json::Value) -> Result<ChunkStream, ServiceError> {
        let response = self
            .client
            .post(self.config.endpoint_url())
            .bearer_auth(&self.config.api_key)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::transport(format!("generation request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::service(
                format!("generation request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| ServiceError::transport(format!("stream read failed: {e}")))
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl GenerationService for HttpGenerationService {
    fn name(&self) -> &str {
        HTTP_SERVICE
    }

    async fn open_stream(&self, req: GenerationRequest) -> Result<ChunkStream, ServiceError> {
        let body = build_request_body(&req);
        debug!(
            run_id = %req.run_id,
            unit_kind = %req.unit_kind,
            session_id = req.session_id.as_deref().unwrap_or(""),
            "opening HTTP generation stream"
        );
        self.config
            .retry_policy
            .retry_open(|| self.open_once(&body))
            .await
    }
}

pub(crate) fn build_request_body(req: &GenerationRequest) -> serde_json::Value {
    let mut body = serde_json::json!({
        "unit_kind": req.unit_kind,
        "inputs": req.variables,
        "stream": true,
    });
    if let Some(session_id) = req.session_id.as_ref().filter(|s| !s.trim().is_empty()) {
        body["session_id"] = serde_json::json!(session_id);
    }
    body
}
