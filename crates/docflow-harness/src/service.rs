use std::collections::BTreeMap;
use std::pin::Pin;

use crate::errors::ServiceError;
use crate::model::UnitKind;

/// Raw byte chunks yielded by a generation service.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, ServiceError>> + Send + 'static>>;

/// Request sent to a generation service.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GenerationRequest {
    /// Correlation id for logs; generated per request.
    pub run_id: uuid::Uuid,
    /// Which kind of artifact is requested.
    pub unit_kind: UnitKind,
    /// Unit-specific template variables.
    pub variables: BTreeMap<String, String>,
    /// Conversation id established by an earlier request in the same pipeline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl GenerationRequest {
    /// Creates a request with no variables and no session.
    pub fn new(unit_kind: UnitKind) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4(),
            unit_kind,
            variables: BTreeMap::new(),
            session_id: None,
        }
    }

    /// Sets one template variable.
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Replaces all template variables.
    pub fn variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Attaches a session id when one is known.
    pub fn session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }
}

/// Contract implemented by transports that can open a generation stream.
///
/// Implementations only open the connection and yield raw chunks; frame
/// decoding happens in the harness.
#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Opens a stream for the request.
    async fn open_stream(&self, req: GenerationRequest) -> Result<ChunkStream, ServiceError>;
}
