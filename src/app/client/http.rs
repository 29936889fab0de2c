//! Core HTTP operations
//!
//! Turns a prepared `RequestContext` into a `reqwest` call. There are no retries here:
//! the only resend the transport performs is the implicit one behind the refresh gate.
//! Cancellation is handled by dropping the future, which aborts the connection.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use crate::app::client::upload::StagedUpload;
use crate::app::decoder::RawResponse;
use crate::app::gate::RequestContext;
use crate::errors::TransportResult;

/// HTTP operations handler
#[derive(Debug, Clone)]
pub struct HttpHandler {
    client: Client,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn builder(&self, request: &RequestContext) -> RequestBuilder {
        self.client
            .request(request.descriptor.method.into(), request.url.clone())
            .headers(request.headers.clone())
    }

    /// Send a data request and read the whole response body
    ///
    /// # Errors
    ///
    /// Returns `TransportFailure` when the exchange fails before a status is received or
    /// while the body is read. HTTP error statuses are not errors at this level.
    pub async fn send(&self, request: &RequestContext) -> TransportResult<RawResponse> {
        let mut builder = self.builder(request);
        if let (Some(body), Some(encoded)) = (&request.descriptor.body, &request.encoded_body) {
            builder = builder
                .header(CONTENT_TYPE, body.content_type())
                .body(encoded.clone());
        }

        debug!("{} {}", request.descriptor.method, request.url);
        let response = builder.send().await?;
        read_response(response).await
    }

    /// Send a staged multipart payload, streamed from disk
    pub async fn send_upload(
        &self,
        request: &RequestContext,
        staged: &StagedUpload,
    ) -> TransportResult<RawResponse> {
        let file = tokio::fs::File::open(staged.path()).await?;
        let response = self
            .builder(request)
            .header(CONTENT_TYPE, staged.content_type())
            .header(CONTENT_LENGTH, staged.len())
            .body(reqwest::Body::from(file))
            .send()
            .await?;

        debug!(
            "Uploaded {} bytes to {} ({})",
            staged.len(),
            request.url,
            response.status()
        );
        read_response(response).await
    }

    /// Send a request and return the response with its body unread, for streaming
    pub async fn open(&self, request: &RequestContext) -> TransportResult<Response> {
        debug!("{} {} (streaming)", request.descriptor.method, request.url);
        Ok(self.builder(request).send().await?)
    }
}

async fn read_response(response: Response) -> TransportResult<RawResponse> {
    let status = response.status();
    let url = response.url().to_string();
    let body = response.bytes().await?;
    Ok(RawResponse::new(status, url, body.to_vec()))
}
