//! Core data structures for the task queues
//!
//! This module defines the request lifecycle state and the statistics snapshot
//! exposed by each queue.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

use crate::app::request::TaskKind;

/// Lifecycle of a submitted request: `Queued -> Dispatched -> (Completed | Cancelled)`.
/// Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestState {
    /// Waiting for a queue slot, or for the refresh gate
    Queued,
    /// Handed to the network
    Dispatched,
    /// A terminal result was produced
    Completed,
    /// Cancelled through its handle
    Cancelled,
}

impl RequestState {
    /// Check if this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Completed | RequestState::Cancelled)
    }

    /// Check if this state represents work waiting to start
    pub fn is_queued(&self) -> bool {
        matches!(self, RequestState::Queued)
    }

    /// Check if this state represents work on the network
    pub fn is_dispatched(&self) -> bool {
        matches!(self, RequestState::Dispatched)
    }

    fn to_u8(self) -> u8 {
        match self {
            RequestState::Queued => 0,
            RequestState::Dispatched => 1,
            RequestState::Completed => 2,
            RequestState::Cancelled => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => RequestState::Queued,
            1 => RequestState::Dispatched,
            2 => RequestState::Completed,
            _ => RequestState::Cancelled,
        }
    }
}

/// Atomic holder for a `RequestState` shared between a handle and its task
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(RequestState::Queued.to_u8()))
    }

    pub fn get(&self) -> RequestState {
        RequestState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// `Queued -> Dispatched`; false if the request already moved on
    pub fn dispatch(&self) -> bool {
        self.0
            .compare_exchange(
                RequestState::Queued.to_u8(),
                RequestState::Dispatched.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Move to a terminal state; false if a terminal state was already reached
    pub fn finish(&self, terminal: RequestState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if RequestState::from_u8(current).is_terminal() {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                terminal.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time statistics of one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub kind: TaskKind,
    /// Concurrency ceiling of the queue
    pub ceiling: usize,
    /// Requests ever submitted
    pub submitted: u64,
    /// Requests currently holding a slot
    pub in_flight: usize,
    /// Highest `in_flight` observed
    pub peak_in_flight: usize,
    /// Requests that finished with any result other than cancellation
    pub completed: u64,
    /// Requests that were cancelled
    pub cancelled: u64,
}

impl QueueStats {
    /// Requests submitted but not yet finished
    pub fn pending(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.cancelled)
    }
}
