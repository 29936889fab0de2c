//! Statistics collection for the task queues
//!
//! Counters are lock-free so recording never contends with admission.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::types::QueueStats;
use crate::app::request::TaskKind;

/// Live counters of one queue
#[derive(Debug, Default)]
pub struct StatsRecorder {
    submitted: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicU64,
    cancelled: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// A request acquired a slot
    pub fn record_started(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::AcqRel);
    }

    /// A request released its slot
    pub fn record_released(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn record_finished(&self, cancelled: bool) {
        if cancelled {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get a snapshot of the counters
    pub fn snapshot(&self, kind: TaskKind, ceiling: usize) -> QueueStats {
        QueueStats {
            kind,
            ceiling,
            submitted: self.submitted.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Acquire),
            peak_in_flight: self.peak_in_flight.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_tracks_highest_concurrency() {
        let recorder = StatsRecorder::new();
        recorder.record_started();
        recorder.record_started();
        recorder.record_released();
        recorder.record_started();
        recorder.record_released();
        recorder.record_released();

        let stats = recorder.snapshot(TaskKind::Interactive, 4);
        assert_eq!(stats.in_flight, 0);
        assert_eq!(stats.peak_in_flight, 2);
        assert_eq!(stats.ceiling, 4);
    }

    #[test]
    fn test_finish_outcomes_are_separated() {
        let recorder = StatsRecorder::new();
        for _ in 0..3 {
            recorder.record_submitted();
        }
        recorder.record_finished(false);
        recorder.record_finished(true);

        let stats = recorder.snapshot(TaskKind::Upload, 1);
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.pending(), 1);
    }
}
