//! Streaming generation harness.
//!
//! A `GenerationService` opens a byte stream for a `GenerationRequest`; the
//! harness decodes its line-delimited frames into `StreamEvent`s on a spawned
//! task and exposes them through a cancellable `RunStream`.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docflow_harness::prelude::*;
//! use docflow_harness::vendors::http::HttpGenerationService;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let harness = Harness::new(Arc::new(HttpGenerationService::from_env()?));
//! let mut run = harness
//!     .start(GenerationRequest::new(UnitKind::Outline).variable("topic", "tide pools"))
//!     .await?;
//!
//! while let Some(event) = run.next_event().await {
//!     match event {
//!         RunEvent::Delta(delta) => print!("{}", delta.content_delta),
//!         RunEvent::Completed(_) => println!(),
//!         RunEvent::Failed(failure) => eprintln!("run failed: {failure}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Line-delimited frame decoder.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Harness entry point and builder.
pub mod harness;
/// Unit kinds and run options.
pub mod model;
/// Connection retry policy.
pub mod policy;
/// Common imports for typical usage.
pub mod prelude;
/// Run task, streaming handle, and cancellation handle.
pub mod run;
/// Generation service contract.
pub mod service;
/// Decoded frames and run events.
pub mod stream;
/// Concrete generation services.
pub mod vendors;

pub use decoder::{DONE_SENTINEL, StreamDecoder, decode_frame};
pub use errors::{HarnessError, RunFailure, ServiceError};
pub use harness::{Harness, HarnessBuilder};
pub use model::{RunOptions, UnitKind};
pub use policy::RetryPolicy;
pub use run::{AbortHandle, RunStream};
pub use service::{ChunkStream, GenerationRequest, GenerationService};
pub use stream::{RunEvent, RunOutput, StreamEvent};
