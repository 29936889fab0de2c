//! Credentials, their persistence, and change events
//!
//! This module provides the credential model consumed by the auth gate, a file-backed
//! store for keeping a credential between runs, and the typed event channel through
//! which observers learn about credential changes.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rest_transport::auth::{Credential, CredentialStore};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::default_location()?;
//! if let Some(credential) = store.load_optional()? {
//!     println!("refresh needed: {}", credential.requires_refresh());
//! }
//! store.save(&Credential::new("token").with_refresh_token("refresh"))?;
//! # Ok(())
//! # }
//! ```

pub mod credentials;
pub mod events;
pub mod token;

// Re-export main public API
pub use credentials::{AuthStatus, CredentialStore, prompt_password};
pub use events::{EventSender, TransportEvent};
pub use token::{Credential, now_millis};
