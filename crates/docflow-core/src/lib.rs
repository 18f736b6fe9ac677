//! Incremental artifact extraction and single-flight pipeline scheduling for
//! streamed document generation.

pub mod core;
pub mod extract;
pub mod observability;
pub mod runtime;
pub mod store;

pub use crate::core::{
    Artifact, ArtifactShape, GenerationUnit, Outline, OutlineSection, Pipeline,
    SectionContent, Session, UnitStatus,
};
pub use extract::{ArtifactSchema, DecodedBuffer, ParsedArtifact, decode, extract_raw, parse};
pub use observability::init_observability;
pub use runtime::{CancelHandle, Scheduler, SchedulerError, UnitBuffer, UnitProgress};
pub use store::{JsonFileStore, PipelineStore, StoreError};
