use std::time::Duration;

use crate::errors::HarnessError;
use crate::policy::RetryPolicy;

/// Configuration for the HTTP generation service client.
#[derive(Clone, Debug)]
pub struct HttpServiceConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL of the generation endpoint host.
    pub base_url: String,
    /// Path of the streaming endpoint, relative to `base_url`.
    pub endpoint_path: String,
    /// HTTP timeout applied to the whole request, stream included.
    pub timeout: Duration,
    /// Retries applied when opening the stream fails.
    pub retry_policy: RetryPolicy,
}

impl HttpServiceConfig {
    /// Creates a config with defaults and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "http://127.0.0.1:8080".to_string(),
            endpoint_path: "/v1/generate".to_string(),
            timeout: Duration::from_secs(120),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Builds a config from `DOCFLOW_API_KEY`, `DOCFLOW_BASE_URL` and
    /// `DOCFLOW_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var("DOCFLOW_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing DOCFLOW_API_KEY for the generation service".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("DOCFLOW_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url.trim());
        }
        if let Ok(raw) = std::env::var("DOCFLOW_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|e| {
                HarnessError::Config(format!("invalid DOCFLOW_TIMEOUT_SECS {raw:?}: {e}"))
            })?;
            config = config.timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.endpoint_path = path.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    pub(crate) fn endpoint_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        )
    }
}
