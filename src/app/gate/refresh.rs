//! Single-flight credential refresh
//!
//! `AuthGate` stands between a queued request and the network. When the credential is
//! within the refresh threshold, requests serialize on a single FIFO permit; the first
//! one through performs the refresh and everyone behind it re-checks and finds a fresh
//! credential. A failed refresh is reported and the gated request proceeds with the
//! stale token so the server can give an authoritative answer.
//!
//! The refresh call itself goes straight to the HTTP handler and does not occupy a
//! queue slot, so a full interactive queue cannot starve the refresh it is waiting on.
//! It runs on its own task holding the permit, and outlives the request that started it:
//! cancelling that request stops the request, never a token rotation in progress.

use std::fmt;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Middleware;
use super::context::{ClientContext, RequestContext};
use super::decorate::apply_client_headers;
use crate::app::models::{RefreshOptions, RefreshRequest, TokenResponse};
use crate::app::queue::RequestTicket;
use crate::app::request::{Endpoint, RequestDescriptor};
use crate::auth::{Credential, TransportEvent, now_millis};
use crate::constants::{auth, headers};
use crate::errors::{NetworkFailure, TransportError, TransportResult};

/// Performs the refresh-token exchange
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        context: &'a ClientContext,
        request: RefreshRequest,
    ) -> BoxFuture<'a, TransportResult<TokenResponse>>;
}

/// Refresh over HTTP: `POST /rest/auth/refresh` with a JSON body
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTokenRefresher;

impl TokenRefresher for HttpTokenRefresher {
    fn refresh<'a>(
        &'a self,
        context: &'a ClientContext,
        request: RefreshRequest,
    ) -> BoxFuture<'a, TransportResult<TokenResponse>> {
        async move {
            let descriptor = RequestDescriptor::post(Endpoint::home(auth::REFRESH_PATH))
                .without_auth()
                .with_json(&request)?;
            let mut outgoing = context.request_context(descriptor, RequestTicket::detached())?;
            apply_client_headers(context.settings(), &mut outgoing)?;

            let response = context.http().send(&outgoing).await?;
            context
                .decoder()
                .decode::<TokenResponse>(&response, outgoing.encoded_body.as_deref())
        }
        .boxed()
    }
}

/// Refresh gate and bearer attachment
pub struct AuthGate {
    context: Weak<ClientContext>,
    permit: Arc<Semaphore>,
    refresher: Arc<dyn TokenRefresher>,
}

impl AuthGate {
    pub fn new(context: Weak<ClientContext>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            context,
            permit: Arc::new(Semaphore::new(1)),
            refresher,
        }
    }

    fn context(&self) -> TransportResult<Arc<ClientContext>> {
        self.context
            .upgrade()
            .ok_or(TransportError::TransportFailure(NetworkFailure::Disconnected))
    }

    async fn acquire(&self) -> TransportResult<OwnedSemaphorePermit> {
        self.permit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::TransportFailure(NetworkFailure::Disconnected))
    }

    /// Refresh the credential first if it is at or near expiry.
    ///
    /// Cancelling `ticket` while waiting returns a cancellation error and the request
    /// never reaches the network. A refresh that has started runs to completion even if
    /// the request that started it is cancelled. A failed refresh is not an error here.
    pub async fn ensure_fresh(&self, ticket: &RequestTicket) -> TransportResult<()> {
        let context = self.context()?;
        if !needs_refresh(&context) {
            return Ok(());
        }

        debug!("Request {} waiting for the refresh permit", ticket.id());
        let permit = tokio::select! {
            biased;
            _ = ticket.token().cancelled() => return Err(TransportError::cancelled()),
            permit = self.acquire() => permit?,
        };

        // Another request may have refreshed while this one waited.
        let current = match context.credential().get() {
            Some(credential) if credential.requires_refresh() => credential,
            _ => {
                debug!("Request {} reusing a refreshed credential", ticket.id());
                return Ok(());
            }
        };

        let refresh = self.spawn_refresh(
            context,
            permit,
            Some(current),
            RefreshOptions::default(),
            true,
        );
        tokio::select! {
            biased;
            _ = ticket.token().cancelled() => Err(TransportError::cancelled()),
            _ = refresh => Ok(()),
        }
    }

    /// Explicit refresh through the same permit
    ///
    /// # Errors
    ///
    /// * `InvalidConfiguration` - no username or refresh token is available
    /// * any error of the refresh exchange itself
    pub async fn refresh_now(&self, options: RefreshOptions) -> TransportResult<Credential> {
        let context = self.context()?;
        let permit = self.acquire().await?;

        let current = context.credential().get();
        self.spawn_refresh(context, permit, current, options, false)
            .await
            .map_err(|_| TransportError::TransportFailure(NetworkFailure::Disconnected))?
    }

    /// Run one refresh exchange on its own task, holding `permit` until it finishes.
    ///
    /// The task owns everything it needs, so dropping the returned handle does not stop
    /// it. Automatic refreshes report failure through the event channel.
    fn spawn_refresh(
        &self,
        context: Arc<ClientContext>,
        permit: OwnedSemaphorePermit,
        current: Option<Credential>,
        options: RefreshOptions,
        automatic: bool,
    ) -> JoinHandle<TransportResult<Credential>> {
        let refresher = self.refresher.clone();
        tokio::spawn(async move {
            let result =
                perform_refresh(refresher.as_ref(), &context, current.as_ref(), options).await;

            if automatic {
                if let Err(e) = &result {
                    warn!("Credential refresh failed, continuing with the current token: {}", e);
                    context.events().emit(TransportEvent::RefreshFailed {
                        message: e.to_string(),
                    });
                }
            }
            drop(permit);
            result
        })
    }
}

async fn perform_refresh(
    refresher: &dyn TokenRefresher,
    context: &ClientContext,
    current: Option<&Credential>,
    options: RefreshOptions,
) -> TransportResult<Credential> {
    let username = options
        .username
        .or_else(|| current.and_then(Credential::effective_username))
        .ok_or_else(|| TransportError::invalid_configuration("no username to refresh as"))?;
    let refresh_token = options
        .refresh_token
        .or_else(|| current.and_then(|credential| credential.refresh_token.clone()))
        .ok_or_else(|| TransportError::invalid_configuration("no refresh token available"))?;

    let settings = context.settings();
    let mut request = RefreshRequest::new(username.as_str(), refresh_token);
    request.client_id = settings.client_id.clone();
    request.client_secret = settings.client_secret.clone();
    request.accept = options.accept;
    request.billing_country = options.billing_country;

    info!("Refreshing credential for {}", username);
    let response = refresher.refresh(context, request).await?;
    let credential = Credential::from_token_response(&response, &username, now_millis());

    if let Some(terms) = response.updated_terms.filter(|terms| !terms.is_empty()) {
        info!("Refresh reported {} updated terms", terms.len());
        context.events().emit(TransportEvent::TermsUpdated(terms));
    }

    context.credential().replace(Some(credential.clone()));
    info!("Credential refreshed ({}...)", credential.log_prefix());
    Ok(credential)
}

fn needs_refresh(context: &ClientContext) -> bool {
    context
        .credential()
        .get()
        .is_some_and(|credential| credential.requires_refresh())
}

impl Middleware for AuthGate {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn prepare<'a>(
        &'a self,
        request: &'a mut RequestContext,
    ) -> BoxFuture<'a, TransportResult<()>> {
        async move {
            if !request.descriptor.requires_auth {
                return Ok(());
            }

            self.ensure_fresh(&request.ticket).await?;

            let context = self.context()?;
            if let Some(credential) = context
                .credential()
                .get()
                .filter(|credential| !credential.access_token.is_empty())
            {
                request.set_header(
                    headers::AUTHORIZATION,
                    &format!("Bearer {}", credential.access_token),
                )?;
            }
            Ok(())
        }
        .boxed()
    }
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("refreshing", &(self.permit.available_permits() == 0))
            .finish()
    }
}
