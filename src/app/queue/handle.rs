//! Cancellable handles for submitted requests

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::types::{RequestState, StateCell};
use crate::app::request::TaskKind;
use crate::errors::{NetworkFailure, TransportError, TransportResult};

/// Handle to a submitted request.
///
/// Await it (or call `result`) for the single terminal result. Dropping the handle does
/// not cancel the request; call `cancel` for that.
#[derive(Debug)]
pub struct PendingRequest<T> {
    id: u64,
    kind: TaskKind,
    token: CancellationToken,
    state: Arc<StateCell>,
    receiver: oneshot::Receiver<TransportResult<T>>,
}

impl<T> PendingRequest<T> {
    pub(crate) fn new(
        id: u64,
        kind: TaskKind,
        token: CancellationToken,
        state: Arc<StateCell>,
        receiver: oneshot::Receiver<TransportResult<T>>,
    ) -> Self {
        Self {
            id,
            kind,
            token,
            state,
            receiver,
        }
    }

    /// A handle that has already failed, for requests rejected before queueing
    pub(crate) fn failed(id: u64, kind: TaskKind, error: TransportError) -> Self {
        let (sender, receiver) = oneshot::channel();
        let state = Arc::new(StateCell::new());
        state.finish(RequestState::Completed);
        let _ = sender.send(Err(error));
        Self::new(id, kind, CancellationToken::new(), state, receiver)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Cancel the request.
    ///
    /// A queued request never reaches the network, including one waiting on the refresh
    /// gate. A dispatched request has its network call aborted. No effect once complete.
    pub fn cancel(&self) {
        if self.state.finish(RequestState::Cancelled) {
            debug!("Cancelled {} request {}", self.kind, self.id);
        }
        self.token.cancel();
    }

    pub fn state(&self) -> RequestState {
        self.state.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == RequestState::Cancelled
    }

    /// True once a terminal result exists (completed or cancelled)
    pub fn is_complete(&self) -> bool {
        self.state().is_terminal()
    }

    /// Wait for the terminal result
    pub async fn result(self) -> TransportResult<T> {
        self.await
    }
}

impl<T: Send + 'static> PendingRequest<T> {
    /// Invoke `callback` exactly once with the terminal result
    pub fn on_complete<F>(self, callback: F) -> CancelHandle
    where
        F: FnOnce(TransportResult<T>) + Send + 'static,
    {
        let cancel = CancelHandle {
            token: self.token.clone(),
            state: self.state.clone(),
        };
        tokio::spawn(async move { callback(self.await) });
        cancel
    }
}

impl<T> Future for PendingRequest<T> {
    type Output = TransportResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            received.unwrap_or_else(|_| {
                Err(TransportError::TransportFailure(
                    NetworkFailure::Disconnected,
                ))
            })
        })
    }
}

/// Cancellation half retained after a handle was turned into a callback
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
    state: Arc<StateCell>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.state.finish(RequestState::Cancelled);
        self.token.cancel();
    }

    pub fn state(&self) -> RequestState {
        self.state.get()
    }
}

/// Task-side view of a request: cancellation checks and dispatch bookkeeping
#[derive(Debug, Clone)]
pub struct RequestTicket {
    id: u64,
    token: CancellationToken,
    state: Arc<StateCell>,
}

impl RequestTicket {
    pub(crate) fn new(id: u64, token: CancellationToken, state: Arc<StateCell>) -> Self {
        Self { id, token, state }
    }

    /// Ticket for work that runs outside a queue
    pub fn detached() -> Self {
        Self::new(0, CancellationToken::new(), Arc::new(StateCell::new()))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.state.get() == RequestState::Cancelled
    }

    /// Mark the request as handed to the network.
    ///
    /// This is the last check before send and must follow any refresh wait.
    pub fn dispatch(&self) -> TransportResult<()> {
        if self.is_cancelled() || !self.state.dispatch() {
            return Err(TransportError::cancelled());
        }
        Ok(())
    }
}
