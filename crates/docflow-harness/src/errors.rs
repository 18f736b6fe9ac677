/// Errors returned by a generation service before they are normalized for the
/// public run stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Service returned an application-level failure (HTTP status, auth, etc.).
    #[error("service error: {message}")]
    Service {
        message: String,
        status_code: Option<u16>,
    },
    /// Transport or stream I/O failed.
    #[error("transport error: {message}")]
    Transport { message: String },
    /// Request or response shape was invalid.
    #[error("protocol error: {message}")]
    Protocol { message: String },
}

impl ServiceError {
    /// Creates a service-level error.
    pub fn service(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Self::Service {
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether opening the stream again may succeed (transport errors,
    /// throttling, and 5xx statuses).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Service {
                status_code: Some(code),
                ..
            } => *code == 429 || (500..600).contains(code),
            Self::Service { .. } | Self::Protocol { .. } => false,
        }
    }
}

/// Terminal run failure sent through `RunEvent::Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
pub enum RunFailure {
    /// Service returned a terminal failure.
    #[error("service failure: {message}")]
    Service { message: String },
    /// Network/stream transport failed.
    #[error("transport failure: {message}")]
    Transport { message: String },
    /// The service response could not be interpreted.
    #[error("protocol failure: {message}")]
    Protocol { message: String },
    /// The run was cancelled by the caller.
    #[error("run cancelled")]
    Cancelled,
}

/// Top-level error type for starting runs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// Invalid harness/service configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid request passed to the harness.
    #[error("validation error: {0}")]
    Validation(String),
    /// Service startup error before the run stream is established.
    #[error(transparent)]
    Service(ServiceError),
}

impl From<ServiceError> for HarnessError {
    fn from(value: ServiceError) -> Self {
        HarnessError::Service(value)
    }
}

pub(crate) fn run_failure_from_service_error(err: &ServiceError) -> RunFailure {
    match err {
        ServiceError::Service { message, .. } => RunFailure::Service {
            message: message.clone(),
        },
        ServiceError::Transport { message } => RunFailure::Transport {
            message: message.clone(),
        },
        ServiceError::Protocol { message } => RunFailure::Protocol {
            message: message.clone(),
        },
    }
}
