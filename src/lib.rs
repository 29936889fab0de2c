//! REST Transport Library
//!
//! A client-side transport for REST APIs: bounded task queues for interactive requests,
//! uploads and downloads, single-flight credential refresh, and a cascading response
//! decoder that classifies every outcome into one typed result.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result, TransportError, TransportResult};
