// src/pipeline/metrics.rs
//
// Tracker observability. Counts for ingestion, association and pruning,
// shared between the ingesting thread and whoever reports them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::tracking::AssociationOutcome;

#[derive(Debug, Clone)]
pub struct TrackerMetrics {
    pub frames_ingested: Arc<AtomicU64>,
    pub fast_matches: Arc<AtomicU64>,
    pub expanded_matches: Arc<AtomicU64>,
    pub placeholders_inserted: Arc<AtomicU64>,
    pub tracks_created: Arc<AtomicU64>,
    pub tracks_pruned: Arc<AtomicU64>,
    pub result_queries: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            frames_ingested: Arc::new(AtomicU64::new(0)),
            fast_matches: Arc::new(AtomicU64::new(0)),
            expanded_matches: Arc::new(AtomicU64::new(0)),
            placeholders_inserted: Arc::new(AtomicU64::new(0)),
            tracks_created: Arc::new(AtomicU64::new(0)),
            tracks_pruned: Arc::new(AtomicU64::new(0)),
            result_queries: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold one frame's association counts into the totals.
    pub fn record_association(&self, outcome: &AssociationOutcome) {
        self.add(&self.fast_matches, outcome.fast_matches as u64);
        self.add(&self.expanded_matches, outcome.expanded_matches as u64);
        self.add(&self.placeholders_inserted, outcome.placeholders as u64);
        self.add(&self.tracks_created, outcome.new_tracks as u64);
    }

    /// Ingestion rate in wall-clock frames per second.
    pub fn fps(&self) -> f64 {
        let frames = self.frames_ingested.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            frames_ingested: self.frames_ingested.load(Ordering::Relaxed),
            fps: self.fps(),
            fast_matches: self.fast_matches.load(Ordering::Relaxed),
            expanded_matches: self.expanded_matches.load(Ordering::Relaxed),
            placeholders_inserted: self.placeholders_inserted.load(Ordering::Relaxed),
            tracks_created: self.tracks_created.load(Ordering::Relaxed),
            tracks_pruned: self.tracks_pruned.load(Ordering::Relaxed),
            result_queries: self.result_queries.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub frames_ingested: u64,
    pub fps: f64,
    pub fast_matches: u64,
    pub expanded_matches: u64,
    pub placeholders_inserted: u64,
    pub tracks_created: u64,
    pub tracks_pruned: u64,
    pub result_queries: u64,
    pub elapsed_secs: f64,
}
