use std::sync::Arc;

use crate::errors::HarnessError;
use crate::model::RunOptions;
use crate::service::GenerationService;

/// Entry point for starting streamed generation runs against one service.
#[derive(Clone)]
pub struct Harness {
    pub(crate) service: Arc<dyn GenerationService>,
    pub(crate) options: RunOptions,
}

impl Harness {
    /// Starts a builder for configuring a `Harness`.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Shorthand for a harness with default options.
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        Self {
            service,
            options: RunOptions::default(),
        }
    }

    /// Name of the underlying service (for logs).
    pub fn service_name(&self) -> &str {
        self.service.name()
    }
}

/// Builder used to attach a service and run options before creating a `Harness`.
#[derive(Default)]
pub struct HarnessBuilder {
    service: Option<Arc<dyn GenerationService>>,
    options: RunOptions,
}

impl HarnessBuilder {
    /// Sets the generation service.
    pub fn service(mut self, service: Arc<dyn GenerationService>) -> Self {
        self.service = Some(service);
        self
    }

    /// Sets the bounded event buffer between the run task and the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<Harness, HarnessError> {
        let service = self
            .service
            .ok_or_else(|| HarnessError::Config("a generation service is required".into()))?;
        if self.options.stream_buffer_capacity == 0 {
            return Err(HarnessError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(Harness {
            service,
            options: self.options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::service::{ChunkStream, GenerationRequest};

    struct DummyService;

    #[async_trait::async_trait]
    impl GenerationService for DummyService {
        fn name(&self) -> &str {
            "dummy"
        }

        async fn open_stream(&self, _req: GenerationRequest) -> Result<ChunkStream, ServiceError> {
            unreachable!("not used in this test")
        }
    }

    #[test]
    fn build_requires_service() {
        let result = Harness::builder().build();
        assert!(
            matches!(result, Err(HarnessError::Config(message)) if message.contains("generation service"))
        );
    }

    #[test]
    fn build_rejects_zero_buffer() {
        let result = Harness::builder()
            .service(Arc::new(DummyService))
            .stream_buffer_capacity(0)
            .build();
        assert!(
            matches!(result, Err(HarnessError::Config(message)) if message.contains("stream_buffer_capacity"))
        );
    }

    #[test]
    fn build_keeps_service_name() {
        let harness = Harness::builder()
            .service(Arc::new(DummyService))
            .build()
            .expect("harness");
        assert_eq!(harness.service_name(), "dummy");
    }
}
