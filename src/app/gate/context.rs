//! Shared client state and per-request context
//!
//! `ClientContext` is the long-lived state every request reads: settings, the HTTP
//! handler, the decoder, staging directories and the credential slot. The credential is
//! the only mutable shared state and is read and written through `CredentialSlot` alone.

use std::sync::RwLock;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::info;
use url::Url;

use crate::app::client::config::{ClientSettings, StagingDirs};
use crate::app::client::http::HttpHandler;
use crate::app::decoder::ResponseDecoder;
use crate::app::queue::RequestTicket;
use crate::app::request::RequestDescriptor;
use crate::auth::{Credential, EventSender, TransportEvent};
use crate::errors::{TransportError, TransportResult};

/// Holder of the current credential with change notification
#[derive(Debug)]
pub struct CredentialSlot {
    value: RwLock<Option<Credential>>,
    events: EventSender,
}

impl CredentialSlot {
    pub fn new(initial: Option<Credential>, events: EventSender) -> Self {
        Self {
            value: RwLock::new(initial),
            events,
        }
    }

    /// Snapshot of the current credential
    pub fn get(&self) -> Option<Credential> {
        match self.value.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the credential wholesale.
    ///
    /// Observers are notified only when the new value differs field-by-field from the old
    /// one. Returns whether a change happened.
    pub fn replace(&self, credential: Option<Credential>) -> bool {
        let changed = {
            let mut guard = match self.value.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if *guard == credential {
                false
            } else {
                *guard = credential.clone();
                true
            }
        };

        if changed {
            match &credential {
                Some(new) => info!("Credential replaced ({}...)", new.log_prefix()),
                None => info!("Credential cleared"),
            }
            self.events.emit(TransportEvent::CredentialChanged(credential));
        }
        changed
    }

    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}

/// Long-lived state shared by the client, its middleware and in-flight requests
#[derive(Debug)]
pub struct ClientContext {
    settings: ClientSettings,
    http: HttpHandler,
    decoder: ResponseDecoder,
    staging: StagingDirs,
    credential: CredentialSlot,
    events: EventSender,
}

impl ClientContext {
    pub fn new(
        settings: ClientSettings,
        http: HttpHandler,
        staging: StagingDirs,
        credential: Option<Credential>,
    ) -> Self {
        let events = EventSender::new();
        Self {
            decoder: ResponseDecoder::new(settings.debug_logging),
            credential: CredentialSlot::new(credential, events.clone()),
            settings,
            http,
            staging,
            events,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn http(&self) -> &HttpHandler {
        &self.http
    }

    pub fn decoder(&self) -> &ResponseDecoder {
        &self.decoder
    }

    pub fn staging(&self) -> &StagingDirs {
        &self.staging
    }

    pub fn credential(&self) -> &CredentialSlot {
        &self.credential
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    /// Base URL present and either a credential or a client identifier available
    pub fn is_configured(&self) -> bool {
        self.settings.is_configured(self.credential.is_present())
    }

    /// Resolve a descriptor into a per-request context
    pub fn request_context(
        &self,
        descriptor: RequestDescriptor,
        ticket: RequestTicket,
    ) -> TransportResult<RequestContext> {
        let url = descriptor.url(self.settings.base_url.as_ref())?;
        let encoded_body = descriptor
            .body
            .as_ref()
            .map(|body| body.encode())
            .transpose()?;

        Ok(RequestContext {
            descriptor,
            url,
            headers: HeaderMap::new(),
            encoded_body,
            ticket,
        })
    }
}

/// Everything known about one request on its way through the middleware chain.
/// Created once per request and owned by that request's task.
#[derive(Debug)]
pub struct RequestContext {
    pub descriptor: RequestDescriptor,
    pub url: Url,
    pub headers: HeaderMap,
    /// Encoded request body, if the descriptor has one
    pub encoded_body: Option<Vec<u8>>,
    pub ticket: RequestTicket,
}

impl RequestContext {
    /// Set a header, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when the name or value is not a legal header.
    pub fn set_header(&mut self, name: &str, value: &str) -> TransportResult<()> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            TransportError::invalid_configuration(format!("header name {}: {}", name, e))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            TransportError::invalid_configuration(format!("header value for {}: {}", name, e))
        })?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;
    use crate::app::request::{Endpoint, QueryParams, RequestBody};

    fn context(credential: Option<Credential>) -> ClientContext {
        let settings = ClientSettings::new("https://api.example.com").unwrap();
        let http = HttpHandler::new(ClientConfig::default().build_http_client().unwrap());
        ClientContext::new(settings, http, StagingDirs::default(), credential)
    }

    #[tokio::test]
    async fn test_replace_notifies_only_on_change() {
        let events = EventSender::new();
        let mut receiver = events.subscribe();
        let slot = CredentialSlot::new(None, events);

        let credential = Credential::new("a").with_refresh_token("r");
        assert!(slot.replace(Some(credential.clone())));
        assert!(!slot.replace(Some(credential.clone())));
        assert!(slot.replace(None));
        assert!(!slot.replace(None));

        assert_eq!(
            receiver.recv().await.unwrap(),
            TransportEvent::CredentialChanged(Some(credential))
        );
        assert_eq!(
            receiver.recv().await.unwrap(),
            TransportEvent::CredentialChanged(None)
        );
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_request_context_encodes_body_and_url() {
        let context = context(Some(Credential::new("t")));
        assert!(context.is_configured());

        let descriptor = RequestDescriptor::post(Endpoint::home("/rest/things"))
            .with_body(RequestBody::form(QueryParams::new().with("a", "b c")))
            .with_query(QueryParams::new().with("page", 2));
        let request = context
            .request_context(descriptor, RequestTicket::detached())
            .unwrap();

        assert_eq!(request.url.as_str(), "https://api.example.com/rest/things?page=2");
        assert_eq!(request.encoded_body.as_deref(), Some(&b"a=b%20c"[..]));
    }

    #[test]
    fn test_set_header_normalizes_names() {
        let context = context(None);
        assert!(!context.is_configured());

        let mut request = context
            .request_context(
                RequestDescriptor::get(Endpoint::home("/x")),
                RequestTicket::detached(),
            )
            .unwrap();
        request.set_header("Api-Key", "abc").unwrap();
        assert_eq!(request.header("api-key"), Some("abc"));
        assert!(request.set_header("Api-Key", "bad\nvalue").is_err());
    }
}
