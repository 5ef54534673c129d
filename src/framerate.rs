// src/framerate.rs
//
// Camera framerate estimate from frame stamps. Every `sample_count` frames
// the rate is (N - 1) / (stamp_N - stamp_1); the counter then restarts so
// consecutive windows do not overlap.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct FramerateEstimator {
    sample_count: usize,
    samples: usize,
    window_start: f64,
    estimate: Option<f64>,
}

impl FramerateEstimator {
    pub fn new(sample_count: usize) -> Self {
        Self {
            sample_count: sample_count.max(2),
            samples: 0,
            window_start: 0.0,
            estimate: None,
        }
    }

    /// Record one frame stamp. Returns the new estimate when a window closes.
    pub fn push(&mut self, stamp: f64) -> Option<f64> {
        if self.samples == 0 {
            self.window_start = stamp;
        }
        self.samples += 1;

        if self.samples < self.sample_count {
            return None;
        }

        self.samples = 0;
        let span = stamp - self.window_start;
        if span <= 0.0 || !span.is_finite() {
            debug!("Framerate window with non-positive span {:.4}s ignored", span);
            return None;
        }

        let framerate = (self.sample_count - 1) as f64 / span;
        self.estimate = Some(framerate);
        Some(framerate)
    }

    pub fn estimate(&self) -> Option<f64> {
        self.estimate
    }

    pub fn reset(&mut self) {
        self.samples = 0;
        self.estimate = None;
    }
}
