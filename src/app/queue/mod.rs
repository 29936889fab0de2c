//! Bounded-concurrency task queues
//!
//! Three independent executors, one per task kind. Interactive requests share a small
//! pool of slots; uploads and downloads are strictly serialized so large transfers do
//! not compete for bandwidth. Admission is FIFO (the slot semaphore is fair); completion
//! order follows network latency.
//!
//! # Examples
//!
//! ```rust,no_run
//! use rest_transport::app::queue::TaskQueues;
//! use rest_transport::app::request::TaskKind;
//!
//! # async fn example() {
//! let queues = TaskQueues::default();
//! let handle = queues.for_kind(TaskKind::Interactive).submit(|ticket| async move {
//!     ticket.dispatch()?;
//!     Ok(42)
//! });
//! assert_eq!(handle.await.unwrap(), 42);
//! # }
//! ```

pub mod handle;
pub mod stats;
pub mod types;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Semaphore, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::app::request::TaskKind;
use crate::config::QueueConfig;
use crate::constants::queues;
use crate::errors::TransportError;

pub use handle::{CancelHandle, PendingRequest, RequestTicket};
pub use stats::StatsRecorder;
pub use types::{QueueStats, RequestState, StateCell};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique request id
pub(crate) fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// One bounded executor
#[derive(Debug)]
pub struct TaskQueue {
    kind: TaskKind,
    ceiling: usize,
    slots: Arc<Semaphore>,
    stats: Arc<StatsRecorder>,
}

impl TaskQueue {
    /// Create a queue running at most `ceiling` tasks at once (minimum 1)
    pub fn new(kind: TaskKind, ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            kind,
            ceiling,
            slots: Arc::new(Semaphore::new(ceiling)),
            stats: Arc::new(StatsRecorder::new()),
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    pub fn stats(&self) -> QueueStats {
        self.stats.snapshot(self.kind, self.ceiling)
    }

    /// Submit work to the queue.
    ///
    /// `job` is only invoked once a slot is free, and receives a `RequestTicket` it must
    /// use to check for cancellation before sending. Cancellation while waiting for a
    /// slot, or while `job` runs, resolves the handle with a cancellation error and frees
    /// the slot. Must be called within a Tokio runtime.
    pub fn submit<T, F, Fut>(&self, job: F) -> PendingRequest<T>
    where
        T: Send + 'static,
        F: FnOnce(RequestTicket) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let id = next_request_id();
        let token = CancellationToken::new();
        let state = Arc::new(StateCell::new());
        let (sender, receiver) = oneshot::channel();

        let ticket = RequestTicket::new(id, token.clone(), state.clone());
        let slots = self.slots.clone();
        let stats = self.stats.clone();
        let kind = self.kind;

        stats.record_submitted();
        debug!("Queued {} request {}", kind, id);

        let task_state = state.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let slot = tokio::select! {
                biased;
                _ = task_token.cancelled() => None,
                slot = slots.acquire_owned() => slot.ok(),
            };

            let mut result = match slot {
                None => Err(TransportError::cancelled()),
                Some(slot) => {
                    stats.record_started();
                    debug!("Started {} request {}", kind, id);

                    let result = tokio::select! {
                        biased;
                        _ = task_token.cancelled() => Err(TransportError::cancelled()),
                        result = job(ticket) => result,
                    };

                    stats.record_released();
                    drop(slot);
                    result
                }
            };

            let terminal = match &result {
                Err(e) if e.is_cancelled() => RequestState::Cancelled,
                _ => RequestState::Completed,
            };
            if !task_state.finish(terminal) && task_state.get() == RequestState::Cancelled {
                result = Err(TransportError::cancelled());
            }

            let cancelled = task_state.get() == RequestState::Cancelled;
            stats.record_finished(cancelled);
            debug!(
                "Finished {} request {} ({})",
                kind,
                id,
                if cancelled { "cancelled" } else { "completed" }
            );

            let _ = sender.send(result);
        });

        PendingRequest::new(id, kind, token, state, receiver)
    }
}

/// The interactive, upload and download queues
#[derive(Debug)]
pub struct TaskQueues {
    interactive: TaskQueue,
    upload: TaskQueue,
    download: TaskQueue,
}

impl TaskQueues {
    pub fn new(interactive: usize, upload: usize, download: usize) -> Self {
        Self {
            interactive: TaskQueue::new(TaskKind::Interactive, interactive),
            upload: TaskQueue::new(TaskKind::Upload, upload),
            download: TaskQueue::new(TaskKind::Download, download),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(
            config.interactive_concurrency,
            config.upload_concurrency,
            config.download_concurrency,
        )
    }

    pub fn for_kind(&self, kind: TaskKind) -> &TaskQueue {
        match kind {
            TaskKind::Interactive => &self.interactive,
            TaskKind::Upload => &self.upload,
            TaskKind::Download => &self.download,
        }
    }

    /// Statistics of all three queues
    pub fn stats(&self) -> [QueueStats; 3] {
        [
            self.interactive.stats(),
            self.upload.stats(),
            self.download.stats(),
        ]
    }
}

impl Default for TaskQueues {
    fn default() -> Self {
        Self::new(
            queues::INTERACTIVE_CONCURRENCY,
            queues::UPLOAD_CONCURRENCY,
            queues::DOWNLOAD_CONCURRENCY,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    // Test that a burst never exceeds the ceiling
    #[tokio::test]
    async fn test_ceiling_holds_under_burst() {
        let queue = TaskQueue::new(TaskKind::Interactive, 4);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let running = running.clone();
                let peak = peak.clone();
                queue.submit(move |ticket| async move {
                    ticket.dispatch()?;
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i);
        }

        assert!(peak.load(Ordering::SeqCst) <= 4);
        let stats = queue.stats();
        assert_eq!(stats.submitted, 100);
        assert_eq!(stats.completed, 100);
        assert!(stats.peak_in_flight <= 4);
        assert_eq!(stats.in_flight, 0);
    }

    // Test that serialized queues run one task at a time in FIFO order
    #[tokio::test]
    async fn test_serialized_queue_is_fifo() {
        let queues = TaskQueues::default();
        let queue = queues.for_kind(TaskKind::Upload);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let order = order.clone();
                queue.submit(move |_ticket| async move {
                    order.lock().await.push(i);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Ok(())
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
        assert_eq!(queue.stats().peak_in_flight, 1);
    }

    // Test that cancelling a queued request keeps it off the network
    #[tokio::test]
    async fn test_cancel_while_waiting_for_slot() {
        let queue = TaskQueue::new(TaskKind::Download, 1);
        let (release, blocked) = oneshot::channel::<()>();
        let ran = Arc::new(AtomicUsize::new(0));

        let first = queue.submit(move |_ticket| async move {
            let _ = blocked.await;
            Ok(())
        });

        let counter = ran.clone();
        let second = queue.submit(move |ticket| async move {
            ticket.dispatch()?;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        second.cancel();
        assert!(second.is_cancelled());
        let _ = release.send(());

        first.await.unwrap();
        assert!(second.await.unwrap_err().is_cancelled());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.stats().cancelled, 1);
    }

    // Test that cancelling a running request frees its slot
    #[tokio::test]
    async fn test_cancel_running_request_frees_slot() {
        let queue = TaskQueue::new(TaskKind::Interactive, 1);

        let stuck = queue.submit(|ticket| async move {
            ticket.dispatch()?;
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(0)
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(stuck.state(), RequestState::Dispatched);

        let next = queue.submit(|_ticket| async move { Ok(1) });
        stuck.cancel();

        assert_eq!(next.await.unwrap(), 1);
        assert!(stuck.await.unwrap_err().is_cancelled());
    }

    // Test that errors from the job are delivered unchanged
    #[tokio::test]
    async fn test_job_error_is_delivered() {
        let queue = TaskQueue::new(TaskKind::Interactive, 2);
        let handle: PendingRequest<()> = queue.submit(|_ticket| async move {
            Err(TransportError::encoding("disk full"))
        });

        assert!(matches!(
            handle.await,
            Err(TransportError::FailedEncodingRequestBody { .. })
        ));
        assert_eq!(queue.stats().completed, 1);
    }

    // Test that callbacks fire exactly once
    #[tokio::test]
    async fn test_on_complete_fires_once() {
        let queue = TaskQueue::new(TaskKind::Interactive, 1);
        let (sender, receiver) = oneshot::channel();

        queue
            .submit(|_ticket| async move { Ok("done") })
            .on_complete(move |result| {
                let _ = sender.send(result.unwrap());
            });

        assert_eq!(receiver.await.unwrap(), "done");
    }
}
