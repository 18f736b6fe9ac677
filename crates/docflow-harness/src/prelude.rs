//! Common imports for typical harness usage.
pub use crate::{
    AbortHandle, GenerationRequest, GenerationService, Harness, HarnessBuilder, HarnessError,
    RunEvent, RunFailure, RunOutput, RunStream, StreamDecoder, StreamEvent, UnitKind,
};
