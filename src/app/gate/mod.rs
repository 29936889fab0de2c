//! Request middleware: the refresh gate and header decoration
//!
//! Every queued request passes through a `MiddlewareChain` after it obtains a queue slot
//! and before it is dispatched. The default chain runs the `AuthGate` (single-flight
//! credential refresh, bearer attachment) followed by the `HeaderDecorator` (user agent
//! and client identifier headers). Callers may append their own middleware.
//!
//! Middleware holds a weak reference to the client context, so a chain never keeps a
//! dropped client alive.

pub mod context;
pub mod decorate;
pub mod refresh;

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::errors::TransportResult;

pub use context::{ClientContext, CredentialSlot, RequestContext};
pub use decorate::HeaderDecorator;
pub use refresh::{AuthGate, HttpTokenRefresher, TokenRefresher};

/// A step that prepares a request before it is sent
pub trait Middleware: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Inspect or modify the request. An error aborts the request with that error.
    fn prepare<'a>(&'a self, request: &'a mut RequestContext) -> BoxFuture<'a, TransportResult<()>>;
}

/// Ordered middleware, run one after another
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    steps: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: Arc<dyn Middleware>) {
        self.steps.push(step);
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first error or at cancellation
    pub async fn run(&self, request: &mut RequestContext) -> TransportResult<()> {
        for step in &self.steps {
            if request.ticket.is_cancelled() {
                return Err(crate::errors::TransportError::cancelled());
            }
            tracing::trace!(
                "Running middleware {} for request {}",
                step.name(),
                request.ticket.id()
            );
            step.prepare(request).await?;
        }
        Ok(())
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|step| step.name()))
            .finish()
    }
}
