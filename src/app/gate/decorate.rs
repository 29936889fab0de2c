//! Standard header decoration

use std::sync::Weak;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::Middleware;
use super::context::{ClientContext, RequestContext};
use crate::app::client::config::ClientSettings;
use crate::constants::headers;
use crate::errors::{NetworkFailure, TransportError, TransportResult};

/// Apply the client headers to a request.
///
/// The user agent override applies everywhere. The compatibility header and both client
/// identifier headers are sent to the home host only, so foreign hosts never learn the
/// client identity.
pub fn apply_client_headers(
    settings: &ClientSettings,
    request: &mut RequestContext,
) -> TransportResult<()> {
    if let Some(user_agent) = settings.user_agent.as_deref().filter(|ua| !ua.is_empty()) {
        request.set_header(headers::USER_AGENT, user_agent)?;
    }

    if !request.descriptor.endpoint.is_home() {
        return Ok(());
    }

    request.set_header(headers::NO_DECORATE, "true")?;
    if let Some(client_id) = settings.client_id.as_deref() {
        request.set_header(headers::API_KEY, client_id)?;
    }
    if let Some(client_secret) = settings.client_secret.as_deref() {
        request.set_header(headers::API_KEY_SECRET, client_secret)?;
    }
    Ok(())
}

/// Middleware form of `apply_client_headers`
#[derive(Debug, Clone)]
pub struct HeaderDecorator {
    context: Weak<ClientContext>,
}

impl HeaderDecorator {
    pub fn new(context: Weak<ClientContext>) -> Self {
        Self { context }
    }
}

impl Middleware for HeaderDecorator {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn prepare<'a>(
        &'a self,
        request: &'a mut RequestContext,
    ) -> BoxFuture<'a, TransportResult<()>> {
        async move {
            let context = self
                .context
                .upgrade()
                .ok_or(TransportError::TransportFailure(NetworkFailure::Disconnected))?;
            apply_client_headers(context.settings(), request)
        }
        .boxed()
    }
}
