//! Scheduler statistics.
//!
//! [`FrameReport`] is the per-update snapshot returned by
//! [`ChunkManager::update`](crate::ChunkManager::update). [`SchedulerMetrics`]
//! accumulates reports and keeps rolling timing windows.

use std::collections::VecDeque;

/// Frames of timing history kept per window (about 2 seconds at 60 fps).
const HISTORY: usize = 128;

/// Most recent `capacity` microsecond timings with a running total.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    samples: VecDeque<u64>,
    capacity: usize,
    total: u64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
        }
    }

    /// Record a timing, dropping the oldest once full.
    pub fn push(&mut self, value: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.total -= oldest;
            }
        }
        self.samples.push_back(value);
        self.total += value;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the window, 0 when empty.
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.total as f64 / self.samples.len() as f64
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(HISTORY)
    }
}

/// What one `update` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub frame_id: u64,
    pub bootstrapped: bool,

    // Requests
    /// New requests accepted by a queue (dedup upgrades excluded).
    pub submitted: usize,
    /// Requests refused by admission control.
    pub rejected: usize,
    pub evicted: usize,
    pub expired: usize,
    /// Predictive requests accepted.
    pub speculative: usize,
    pub dispatched: usize,

    // Completions
    pub completed: usize,
    /// Results nobody wanted any more.
    pub stale: usize,
    pub failed: usize,
    /// Nodes resolved by the density cull test without a worker.
    pub prefiltered: usize,

    // Structure
    pub subdivisions: usize,
    pub collapses: usize,
    /// Chunks released by the resident budget.
    pub budget_releases: usize,

    // Snapshot
    pub queued_essential: usize,
    pub queued_regular: usize,
    pub in_flight: usize,
    pub resident_chunks: usize,
    pub nodes: usize,
    pub camera_speed: f32,
    pub update_us: u64,
}

/// Totals and timing history across frames.
#[derive(Debug, Clone, Default)]
pub struct SchedulerMetrics {
    pub frames: u64,
    pub submitted: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub expired: u64,
    pub speculative: u64,
    pub dispatched: u64,
    pub completed: u64,
    pub stale: u64,
    pub failed: u64,
    pub prefiltered: u64,
    pub subdivisions: u64,
    pub collapses: u64,
    pub budget_releases: u64,
    /// Worker wall time per generated chunk, microseconds.
    pub generation_us: RollingWindow,
    /// Main-thread time per update, microseconds.
    pub update_us: RollingWindow,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_generation(&mut self, elapsed_us: u64) {
        self.generation_us.push(elapsed_us);
    }

    /// Fold a frame report into the totals.
    pub fn record_frame(&mut self, report: &FrameReport) {
        self.frames += 1;
        self.submitted += report.submitted as u64;
        self.rejected += report.rejected as u64;
        self.evicted += report.evicted as u64;
        self.expired += report.expired as u64;
        self.speculative += report.speculative as u64;
        self.dispatched += report.dispatched as u64;
        self.completed += report.completed as u64;
        self.stale += report.stale as u64;
        self.failed += report.failed as u64;
        self.prefiltered += report.prefiltered as u64;
        self.subdivisions += report.subdivisions as u64;
        self.collapses += report.collapses as u64;
        self.budget_releases += report.budget_releases as u64;
        self.update_us.push(report.update_us);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The running total follows evictions.
    #[test]
    fn test_rolling_window_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        for v in 1..=5u64 {
            window.push(v);
        }
        assert_eq!(window.len(), 3);
        assert!((window.average() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_window() {
        let mut window = RollingWindow::new(0);
        window.push(10);
        assert!(window.is_empty());
        assert_eq!(window.average(), 0.0);
        assert!(RollingWindow::default().is_empty());
    }

    #[test]
    fn test_record_frame_accumulates() {
        let mut metrics = SchedulerMetrics::new();
        let report = FrameReport {
            submitted: 3,
            completed: 2,
            stale: 1,
            update_us: 50,
            ..Default::default()
        };
        metrics.record_frame(&report);
        metrics.record_frame(&report);
        assert_eq!(metrics.frames, 2);
        assert_eq!(metrics.submitted, 6);
        assert_eq!(metrics.completed, 4);
        assert_eq!(metrics.stale, 2);
        assert_eq!(metrics.update_us.len(), 2);
    }
}
