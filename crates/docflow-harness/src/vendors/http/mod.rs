//! HTTP generation service.
//!
//! Posts `{ unit_kind, inputs, session_id?, stream: true }` as JSON and hands
//! the streamed response body to the harness decoder.
mod config;
mod service;

pub use config::HttpServiceConfig;
pub use service::HttpGenerationService;
