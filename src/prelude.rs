//! Prelude module for the REST Transport Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use rest_transport::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rest_transport::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let store = CredentialStore::default_location()?;
//!     let client = TransportClient::builder(ClientSettings::new("https://api.example.com")?)
//!         .credential(store.load_optional()?)
//!         .build()?;
//!
//!     let _: NoContent = client
//!         .perform(RequestDescriptor::delete(Endpoint::home("/rest/sessions/current")))
//!         .await?;
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result, TransportError, TransportResult};

// Essential transport components
pub use crate::app::{
    ClientConfig, ClientSettings, Endpoint, Method, NoContent, PendingRequest, ProgressSink,
    QueryParams, RefreshOptions, RequestBody, RequestDescriptor, ServerMessage, StagingDirs,
    TaskKind, TransportClient,
};

// Credentials and events
pub use crate::auth::{Credential, CredentialStore, TransportEvent};

// Configuration
pub use crate::config::AppConfig;

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

// Common external crate re-exports for convenience
pub use tokio;
