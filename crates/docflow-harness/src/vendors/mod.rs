/// Generation service reached over HTTP with bearer auth.
pub mod http;
