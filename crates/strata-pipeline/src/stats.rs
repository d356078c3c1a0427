//! Wall-clock counters for the expensive pipeline stages.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Accumulating stopwatch.
///
/// `start(false)` resumes accumulation, `start(true)` discards what was
/// measured before. Time between `start` and `stop` is added on `stop`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatCounter {
    elapsed: Duration,
    started: Option<Instant>,
}

impl StatCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, reset: bool) {
        if reset {
            self.elapsed = Duration::ZERO;
        }
        self.started = Some(Instant::now());
    }

    /// No-op when the counter is not running.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.elapsed += started.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = Duration::ZERO;
        self.started = None;
    }

    /// Add time measured elsewhere, e.g. by a counter on a worker thread.
    pub fn add(&mut self, duration: Duration) {
        self.elapsed += duration;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    /// Accumulated time, excluding a still-running interval.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }
}

/// Numbers reported when a run, or a whole batch, finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub height_generation: Duration,
    pub tbn_calculation: Duration,
    pub erosion: Duration,
    /// Completed runs covered by these numbers.
    pub runs: u32,
    /// Seed of every completed run, in order.
    pub seeds: Vec<u64>,
}

impl GenerationStats {
    pub fn total(&self) -> Duration {
        self.height_generation + self.tbn_calculation + self.erosion
    }
}
