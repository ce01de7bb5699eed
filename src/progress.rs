// Sweep Progress - Thread-safe counters for operator feedback
// Nothing here feeds back into scheduling or scoring.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct ProgressState {
    started: Instant,
    completed_samples: usize,
    completed_chunks: usize,
    collisions: usize,
}

/// Shared handle; clones observe the same counters
#[derive(Debug, Clone)]
pub struct SweepProgress {
    total_samples: usize,
    total_chunks: usize,
    state: Arc<RwLock<ProgressState>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ProgressSnapshot {
    pub total_samples: usize,
    pub completed_samples: usize,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub collisions: usize,
    pub elapsed_secs: f64,
}

impl ProgressSnapshot {
    pub fn fraction(&self) -> f64 {
        if self.total_samples == 0 {
            1.0
        } else {
            self.completed_samples as f64 / self.total_samples as f64
        }
    }

    /// Remaining time extrapolated from the observed rate
    pub fn remaining(&self) -> Option<Duration> {
        if self.completed_samples == 0 {
            return None;
        }
        let per_sample = self.elapsed_secs / self.completed_samples as f64;
        let left = self.total_samples.saturating_sub(self.completed_samples);
        Some(Duration::from_secs_f64(per_sample * left as f64))
    }
}

impl SweepProgress {
    pub fn new(total_samples: usize, total_chunks: usize) -> Self {
        Self {
            total_samples,
            total_chunks,
            state: Arc::new(RwLock::new(ProgressState {
                started: Instant::now(),
                completed_samples: 0,
                completed_chunks: 0,
                collisions: 0,
            })),
        }
    }

    pub fn record_sample(&self, collided: bool) {
        let mut state = self.state.write();
        state.completed_samples += 1;
        if collided {
            state.collisions += 1;
        }
    }

    pub fn record_chunk(&self) {
        self.state.write().completed_chunks += 1;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.read();
        ProgressSnapshot {
            total_samples: self.total_samples,
            completed_samples: state.completed_samples,
            total_chunks: self.total_chunks,
            completed_chunks: state.completed_chunks,
            collisions: state.collisions,
            elapsed_secs: state.started.elapsed().as_secs_f64(),
        }
    }
}
