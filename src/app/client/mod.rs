//! Transport client façade
//!
//! `TransportClient` accepts request descriptors and returns cancellable handles. Each
//! request is validated on submission, queued by task kind, passed through the
//! middleware chain (refresh gate, header decoration, caller middleware), dispatched and
//! classified into exactly one terminal result.
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and runtime settings
//! - `http`: Core HTTP operations
//! - `upload`: Multipart staging for uploads
//! - `download`: Streaming downloads with atomic relocation
//!
//! # Examples
//!
//! ```rust,no_run
//! use rest_transport::app::client::{ClientSettings, TransportClient};
//! use rest_transport::app::request::{Endpoint, RequestDescriptor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = ClientSettings::new("https://api.example.com")?
//!     .with_client("my-app", None::<String>);
//! let client = TransportClient::new(settings)?;
//!
//! let profile: serde_json::Value = client
//!     .perform(RequestDescriptor::get(Endpoint::home("/rest/users/me")))
//!     .await?;
//! println!("{}", profile);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::app::decoder::RawResponse;
use crate::app::gate::{
    AuthGate, ClientContext, HeaderDecorator, HttpTokenRefresher, Middleware, MiddlewareChain,
    RequestContext, TokenRefresher,
};
use crate::app::models::RefreshOptions;
use crate::app::queue::{PendingRequest, QueueStats, TaskQueues, next_request_id};
use crate::app::request::{Endpoint, QueryParams, RequestBody, RequestDescriptor};
use crate::auth::{Credential, TransportEvent};
use crate::config::{AppConfig, QueueConfig};
use crate::constants::auth;
use crate::errors::{NetworkFailure, TransportError, TransportResult};

// Module declarations
pub mod config;
pub mod download;
pub mod http;
pub mod upload;

pub use config::{ClientConfig, ClientSettings, StagingDirs};

use download::DownloadHandler;
use http::HttpHandler;
use upload::StagedUpload;

/// Client for a REST API with managed credentials
#[derive(Debug)]
pub struct TransportClient {
    context: Arc<ClientContext>,
    gate: Arc<AuthGate>,
    chain: Arc<MiddlewareChain>,
    queues: TaskQueues,
}

impl TransportClient {
    /// Client with default connection settings, queue ceilings and staging directories
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the HTTP client cannot be built
    pub fn new(settings: ClientSettings) -> TransportResult<Self> {
        Self::builder(settings).build()
    }

    pub fn builder(settings: ClientSettings) -> TransportClientBuilder {
        TransportClientBuilder::new(settings)
    }

    /// Client from loaded application configuration
    pub fn from_config(
        config: &AppConfig,
        credential: Option<Credential>,
    ) -> TransportResult<Self> {
        let (settings, http, staging) = config.to_runtime_config()?;
        Self::builder(settings)
            .http_config(http)
            .queue_config(config.queues.clone())
            .staging(staging)
            .credential(credential)
            .build()
    }

    /// Perform a data request and decode the response as `T`
    ///
    /// Use `NoContent` for endpoints that answer with an empty body and `String` for
    /// plain-text bodies.
    pub fn perform<T>(&self, descriptor: RequestDescriptor) -> PendingRequest<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.submit(descriptor, |context, request| async move {
            let response = context.http().send(&request).await?;
            context
                .decoder()
                .decode::<T>(&response, request.encoded_body.as_deref())
        })
    }

    /// Perform a data request and return the response unclassified.
    ///
    /// Only network failures are errors; the caller interprets the status.
    pub fn perform_raw(&self, descriptor: RequestDescriptor) -> PendingRequest<RawResponse> {
        self.submit(descriptor, |context, request| async move {
            context.http().send(&request).await
        })
    }

    /// Upload the descriptor's file as multipart form data through the upload queue.
    ///
    /// The payload is staged on disk first and the staged copy is removed afterwards,
    /// whatever the outcome.
    pub fn upload<T>(&self, descriptor: RequestDescriptor) -> PendingRequest<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.submit(descriptor, |context, request| async move {
            let file = request.descriptor.file.clone().ok_or_else(|| {
                TransportError::MissingRequestBody {
                    method: request.descriptor.method.to_string(),
                }
            })?;

            let staged = StagedUpload::stage(
                &context.staging().uploads,
                &file,
                request.encoded_body.as_deref(),
            )
            .await?;
            let response = context.http().send_upload(&request, &staged).await;
            drop(staged);

            context
                .decoder()
                .decode::<T>(&response?, request.encoded_body.as_deref())
        })
    }

    /// Download the target into the downloads staging directory through the download
    /// queue, resolving to the relocated file's path
    pub fn download(&self, descriptor: RequestDescriptor) -> PendingRequest<PathBuf> {
        self.submit(descriptor, |context, request| async move {
            DownloadHandler::new(context.http(), context.decoder())
                .download(&request, &context.staging().downloads)
                .await
        })
    }

    /// Exchange a username and password for a credential and install it
    ///
    /// # Errors
    ///
    /// Any error of the token request; the stored credential is left unchanged.
    pub async fn exchange_password(
        &self,
        username: &str,
        password: &str,
    ) -> TransportResult<Credential> {
        let settings = self.context.settings();
        let mut params = QueryParams::new()
            .with("username", username)
            .with("password", password)
            .with("grant_type", "password")
            .with("redirect_uri", auth::DEFAULT_REDIRECT_URI);
        if let Some(client_id) = settings.client_id.as_deref() {
            params.put("client_id", Some(client_id));
        }
        if let Some(client_secret) = settings.client_secret.as_deref() {
            params.put("client_secret", Some(client_secret));
        }

        let descriptor = RequestDescriptor::post(Endpoint::home(auth::ACCESS_TOKEN_PATH))
            .without_auth()
            .with_body(RequestBody::form(params));

        let mut credential: Credential = self.perform(descriptor).await?;
        if credential.username.is_none() {
            credential.username = Some(username.to_string());
        }

        info!("Signed in as {}", username);
        self.set_credential(Some(credential.clone()));
        Ok(credential)
    }

    /// Refresh the credential now, through the same single-flight permit as automatic
    /// refreshes
    ///
    /// # Errors
    ///
    /// * `InvalidConfiguration` - no username or refresh token is available
    /// * any error of the refresh exchange
    pub async fn refresh_credential(&self, options: RefreshOptions) -> TransportResult<Credential> {
        self.gate.refresh_now(options).await
    }

    /// Current credential
    pub fn credential(&self) -> Option<Credential> {
        self.context.credential().get()
    }

    /// Replace the credential; observers are notified only on an actual change
    pub fn set_credential(&self, credential: Option<Credential>) -> bool {
        self.context.credential().replace(credential)
    }

    /// Forget the credential (logout)
    pub fn clear_credential(&self) -> bool {
        self.set_credential(None)
    }

    /// Observe credential changes, updated terms and refresh failures
    pub fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.context.events().subscribe()
    }

    /// Base URL present and either a credential or a client identifier available
    pub fn is_configured(&self) -> bool {
        self.context.is_configured()
    }

    pub fn settings(&self) -> &ClientSettings {
        self.context.settings()
    }

    pub fn staging(&self) -> &StagingDirs {
        self.context.staging()
    }

    /// Statistics of the interactive, upload and download queues
    pub fn queue_stats(&self) -> [QueueStats; 3] {
        self.queues.stats()
    }

    /// Reject a descriptor before it reaches a queue
    fn precheck(&self, descriptor: &RequestDescriptor) -> TransportResult<()> {
        descriptor.validate()?;
        descriptor.url(self.context.settings().base_url.as_ref())?;

        if descriptor.requires_auth && !self.is_configured() {
            return Err(TransportError::invalid_configuration(
                "authenticated request before the client is configured",
            ));
        }
        Ok(())
    }

    fn submit<T, F, Fut>(&self, descriptor: RequestDescriptor, send: F) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<ClientContext>, RequestContext) -> Fut + Send + 'static,
        Fut: Future<Output = TransportResult<T>> + Send + 'static,
    {
        let kind = descriptor.kind;
        if let Err(e) = self.precheck(&descriptor) {
            debug!("Rejected {} {} request: {}", descriptor.method, kind, e);
            return PendingRequest::failed(next_request_id(), kind, e);
        }

        let context = Arc::downgrade(&self.context);
        let chain = self.chain.clone();
        self.queues.for_kind(kind).submit(move |ticket| async move {
            let context = context
                .upgrade()
                .ok_or(TransportError::TransportFailure(NetworkFailure::Disconnected))?;

            let mut request = context.request_context(descriptor, ticket)?;
            chain.run(&mut request).await?;
            request.ticket.dispatch()?;

            send(context, request).await
        })
    }
}

/// Builder for `TransportClient`
pub struct TransportClientBuilder {
    settings: ClientSettings,
    http: ClientConfig,
    queues: QueueConfig,
    staging: Option<StagingDirs>,
    credential: Option<Credential>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl TransportClientBuilder {
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            settings,
            http: ClientConfig::default(),
            queues: QueueConfig::default(),
            staging: None,
            credential: None,
            refresher: None,
            middleware: Vec::new(),
        }
    }

    pub fn http_config(mut self, config: ClientConfig) -> Self {
        self.http = config;
        self
    }

    pub fn queue_config(mut self, config: QueueConfig) -> Self {
        self.queues = config;
        self
    }

    pub fn staging(mut self, staging: StagingDirs) -> Self {
        self.staging = Some(staging);
        self
    }

    /// Initial credential, e.g. one loaded from a `CredentialStore`
    pub fn credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    /// Replace the HTTP refresh exchange
    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Append middleware; it runs after the refresh gate and header decoration
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` if the HTTP client cannot be built
    pub fn build(self) -> TransportResult<TransportClient> {
        let http = HttpHandler::new(self.http.build_http_client()?);
        let context = Arc::new(ClientContext::new(
            self.settings,
            http,
            self.staging.unwrap_or_default(),
            self.credential,
        ));

        let refresher = self
            .refresher
            .unwrap_or_else(|| Arc::new(HttpTokenRefresher) as Arc<dyn TokenRefresher>);
        let gate = Arc::new(AuthGate::new(Arc::downgrade(&context), refresher));

        let mut chain = MiddlewareChain::new();
        chain.push(gate.clone());
        chain.push(Arc::new(HeaderDecorator::new(Arc::downgrade(&context))));
        for middleware in self.middleware {
            chain.push(middleware);
        }

        let queues = TaskQueues::from_config(&self.queues);
        info!(
            "Transport client ready (base URL: {}, queues {}/{}/{})",
            context
                .settings()
                .base_url
                .as_ref()
                .map(|url| url.as_str())
                .unwrap_or("<unset>"),
            self.queues.interactive_concurrency,
            self.queues.upload_concurrency,
            self.queues.download_concurrency
        );

        Ok(TransportClient {
            context,
            gate,
            chain: Arc::new(chain),
            queues,
        })
    }
}
