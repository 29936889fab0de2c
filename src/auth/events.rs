//! Typed transport events
//!
//! Observers subscribe to a broadcast channel instead of a process-wide notification
//! center. A slow subscriber only loses old events, it never blocks the transport.

use tokio::sync::broadcast;
use tracing::debug;

use crate::app::models::UpdatedTerms;
use crate::auth::Credential;
use crate::constants::events::CHANNEL_CAPACITY;

/// Events emitted by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The credential was replaced or cleared; only sent on an actual change
    CredentialChanged(Option<Credential>),
    /// A refresh reported previously accepted terms that need re-acceptance
    TermsUpdated(Vec<UpdatedTerms>),
    /// An automatic refresh failed; the gated request proceeds with the old token
    RefreshFailed { message: String },
}

/// Sending half of the event channel
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: broadcast::Sender<TransportEvent>,
}

impl EventSender {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Register a new observer
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.sender.subscribe()
    }

    /// Publish an event; having no subscribers is not an error
    pub fn emit(&self, event: TransportEvent) {
        if self.sender.send(event).is_err() {
            debug!("Transport event dropped: no subscribers");
        }
    }
}

impl Default for EventSender {
    fn default() -> Self {
        Self::new()
    }
}
