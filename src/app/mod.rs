//! Core transport engine
//!
//! This module contains the request pipeline: descriptors, the bounded task queues, the
//! refresh gate and header middleware, the HTTP client façade with upload staging and
//! download relocation, and the cascading response decoder.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rest_transport::app::{ClientSettings, Endpoint, RequestDescriptor, TransportClient};
//! use rest_transport::auth::Credential;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = TransportClient::builder(ClientSettings::new("https://api.example.com")?)
//!     .credential(Some(Credential::new("access").with_refresh_token("refresh")))
//!     .build()?;
//!
//! // Queued, refreshed if needed, decorated, sent and decoded
//! let handle = client.perform::<serde_json::Value>(RequestDescriptor::get(Endpoint::home(
//!     "/rest/users/me",
//! )));
//! let profile = handle.await?;
//! println!("{}", profile);
//!
//! // Files go through their own serialized queues
//! let path = client
//!     .download(RequestDescriptor::download(Endpoint::home("/rest/files/42")))
//!     .await?;
//! println!("saved to {}", path.display());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod decoder;
pub mod gate;
pub mod models;
pub mod queue;
pub mod request;

// Re-export main public API
pub use client::{
    ClientConfig, ClientSettings, StagingDirs, TransportClient, TransportClientBuilder,
};
pub use decoder::{RawResponse, ResponseDecoder};
pub use gate::{AuthGate, Middleware, RequestContext, TokenRefresher};
pub use models::{NoContent, RefreshOptions, ServerMessage, TokenResponse, UpdatedTerms};
pub use queue::{CancelHandle, PendingRequest, QueueStats, RequestState, TaskQueues};
pub use request::{
    Endpoint, Method, ProgressSink, QueryParams, RequestBody, RequestDescriptor, TaskKind,
};
