// src/tracking/tracker.rs
//
// The live track set behind one lock.
//
// Ingestion (association + pruning) and result queries each take the lock
// once, so a query sees the track set either before or after a frame, never
// halfway through one. Tracks are owned by the set; queries get clones.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::associator::{AssociationOutcome, FrameAssociator};
use super::lifecycle;
use super::observation::{Observation, PixelPoint, Track};
use crate::clock::{Clock, SystemClock};
use crate::debug::TrackDebugInfo;
use crate::error::{Result, TrackerError};
use crate::framerate::FramerateEstimator;
use crate::identity::{contains_dead_run, CrossCorrelationMatcher, Identity, SignalMatcher};
use crate::pipeline::TrackerMetrics;
use crate::types::{Config, DebugConfig, FramerateConfig, TrackingConfig};

/// Framerates at or below this (Hz) are ignored.
const MIN_FRAMERATE: f64 = 1.0;

/// One track's full history with its resolved identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackResult {
    pub track: Track,
    pub identity: Identity,
}

struct TrackerState {
    tracks: Vec<Track>,
    associator: FrameAssociator,
    matcher: Arc<dyn SignalMatcher>,
    reference_length: usize,
    growth_factor: f64,
    history_cap: usize,
    min_match_ratio: f64,
    framerate: Option<f64>,
    framerate_estimator: FramerateEstimator,
    debug: DebugConfig,
}

impl TrackerState {
    fn timing_tolerance(&self) -> f64 {
        lifecycle::timing_tolerance(self.framerate)
    }

    fn apply_framerate(&mut self, framerate: f64) -> bool {
        if !(framerate > MIN_FRAMERATE) || !framerate.is_finite() {
            warn!("⚠️  Ignoring implausible framerate {:.3} Hz", framerate);
            return false;
        }
        let changed = self
            .framerate
            .map_or(true, |old| (old - framerate).abs() > 1e-9);
        if changed {
            info!(
                "🎞️  Framerate {:.2} Hz → timing tolerance {:.4}s",
                framerate,
                lifecycle::timing_tolerance(Some(framerate))
            );
        }
        self.framerate = Some(framerate);
        true
    }

    fn install_matcher(&mut self, matcher: Arc<dyn SignalMatcher>) -> Result<()> {
        let reference_length = matcher.reference_length();
        if reference_length == 0 {
            return Err(TrackerError::EmptyCodeSet);
        }

        self.matcher = matcher;
        self.reference_length = reference_length;
        self.history_cap = lifecycle::history_cap(reference_length, self.growth_factor);

        let cap = self.history_cap;
        for track in self.tracks.iter_mut() {
            track.enforce_cap(cap);
        }

        info!(
            "🔑 Identity codes configured: length {}, history cap {}",
            reference_length, self.history_cap
        );
        Ok(())
    }

    fn resolve(&self, track: &Track) -> Identity {
        let states = track.recent_states(self.reference_length);
        if contains_dead_run(&states) {
            return Identity::Invalid;
        }
        self.matcher
            .match_sequence(&states)
            .map(Identity::Code)
            .unwrap_or(Identity::Unmatched)
    }

    fn associate(&mut self, detections: Vec<Observation>, now: f64) -> AssociationOutcome {
        let cap = self.history_cap;
        self.associator
            .associate(detections, &mut self.tracks, now, cap)
    }

    fn prune(&mut self, now: f64) -> usize {
        let tolerance = self.timing_tolerance();
        lifecycle::prune_tracks(&mut self.tracks, now, tolerance)
    }
}

/// Online tracker for blinking markers.
///
/// Feed it one batch of detected points per camera frame through
/// [`BlinkTracker::process_frame`]; query identities at any time through
/// [`BlinkTracker::get_results`]. All methods take `&self` and the tracker
/// is `Send + Sync`, so it can be shared in an `Arc` between an ingesting
/// thread and query threads.
pub struct BlinkTracker {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
    metrics: TrackerMetrics,
}

impl BlinkTracker {
    /// Build a tracker for a decoded code set. Fails on an empty or ragged
    /// code set and on out-of-range tracking parameters.
    pub fn new(
        tracking: &TrackingConfig,
        codes: Vec<Vec<bool>>,
        min_match_ratio: f64,
    ) -> Result<Self> {
        tracking.validate()?;
        let matcher = CrossCorrelationMatcher::new(codes, min_match_ratio)?;
        let reference_length = matcher.reference_length();
        let history_cap = lifecycle::history_cap(reference_length, tracking.buffer_growth_factor);

        let framerate = if tracking.initial_framerate > MIN_FRAMERATE {
            Some(tracking.initial_framerate)
        } else {
            None
        };

        info!(
            "🔑 Tracker ready: {} codes of length {}, history cap {}",
            matcher.codes().len(),
            reference_length,
            history_cap
        );

        Ok(Self {
            state: Mutex::new(TrackerState {
                tracks: Vec::new(),
                associator: FrameAssociator::new(tracking),
                matcher: Arc::new(matcher),
                reference_length,
                growth_factor: tracking.buffer_growth_factor,
                history_cap,
                min_match_ratio,
                framerate,
                framerate_estimator: FramerateEstimator::new(
                    FramerateConfig::default().sample_count,
                ),
                debug: DebugConfig::default(),
            }),
            clock: Arc::new(SystemClock),
            metrics: TrackerMetrics::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let codes = config.identity.parse_sequences()?;
        let tracker = Self::new(&config.tracking, codes, config.identity.min_match_ratio)?;
        {
            let mut state = tracker.state.lock();
            state.framerate_estimator = FramerateEstimator::new(config.framerate.sample_count);
        }
        tracker.set_debug_flags(config.debug);
        Ok(tracker)
    }

    /// Replace the time source used for placeholders and staleness.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &TrackerMetrics {
        &self.metrics
    }

    // ========================================================================
    // CONFIGURATION
    // ========================================================================

    /// Replace the identity code set. On error the previous set stays.
    pub fn set_sequences(&self, codes: Vec<Vec<bool>>) -> Result<()> {
        let min_match_ratio = self.state.lock().min_match_ratio;
        let matcher = CrossCorrelationMatcher::new(codes, min_match_ratio)?;
        self.set_matcher(Arc::new(matcher))
    }

    /// Install a custom matcher. Its reference length drives the result
    /// window and the history cap.
    pub fn set_matcher(&self, matcher: Arc<dyn SignalMatcher>) -> Result<()> {
        self.state.lock().install_matcher(matcher)
    }

    pub fn set_debug_flags(&self, flags: DebugConfig) {
        let mut state = self.state.lock();
        state.associator.set_trace(flags.debug);
        state.debug = flags;
    }

    /// Push a framerate estimate (Hz). Values ≤ 1 Hz are ignored.
    pub fn update_framerate(&self, framerate: f64) -> bool {
        self.state.lock().apply_framerate(framerate)
    }

    pub fn framerate(&self) -> Option<f64> {
        self.state.lock().framerate
    }

    /// Staleness window in seconds.
    pub fn timing_tolerance(&self) -> f64 {
        self.state.lock().timing_tolerance()
    }

    pub fn reference_length(&self) -> usize {
        self.state.lock().reference_length
    }

    pub fn history_cap(&self) -> usize {
        self.state.lock().history_cap
    }

    // ========================================================================
    // INGESTION
    // ========================================================================

    /// Ingest one camera frame: association, placeholders, then pruning,
    /// all under one lock. The stamp also feeds the framerate estimate.
    pub fn process_frame<I, P>(&self, points: I, stamp: f64) -> AssociationOutcome
    where
        I: IntoIterator<Item = P>,
        P: Into<PixelPoint>,
    {
        let detections: Vec<Observation> = points
            .into_iter()
            .map(|p| Observation::detection(p.into(), stamp))
            .collect();

        let now = self.clock.now();
        let mut state = self.state.lock();

        if let Some(framerate) = state.framerate_estimator.push(stamp) {
            state.apply_framerate(framerate);
        }

        let outcome = state.associate(detections, now);
        let pruned = state.prune(now);

        if state.debug.debug {
            debug!(
                "📷 Frame t={:.3}: fast={} expanded={} placeholders={} new={} pruned={} live={}",
                stamp,
                outcome.fast_matches,
                outcome.expanded_matches,
                outcome.placeholders,
                outcome.new_tracks,
                pruned,
                state.tracks.len()
            );
        }
        drop(state);

        self.metrics.inc(&self.metrics.frames_ingested);
        self.metrics.record_association(&outcome);
        self.metrics.add(&self.metrics.tracks_pruned, pruned as u64);
        outcome
    }

    /// Associate pre-built detections without pruning.
    pub fn associate(&self, detections: Vec<Observation>) -> AssociationOutcome {
        let now = self.clock.now();
        let outcome = self.state.lock().associate(detections, now);
        self.metrics.record_association(&outcome);
        outcome
    }

    /// Remove dead and stale tracks. Returns the number removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let pruned = self.state.lock().prune(now);
        self.metrics.add(&self.metrics.tracks_pruned, pruned as u64);
        pruned
    }

    /// Drop all tracks and the framerate window.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tracks.clear();
        state.framerate_estimator.reset();
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Every live track with its identity. Safe to call while another
    /// thread ingests frames.
    pub fn get_results(&self) -> Vec<TrackResult> {
        let state = self.state.lock();
        let results: Vec<TrackResult> = state
            .tracks
            .iter()
            .map(|track| TrackResult {
                identity: state.resolve(track),
                track: track.clone(),
            })
            .collect();

        if state.debug.debug {
            for (i, r) in results.iter().enumerate() {
                debug!("🏷️  Track {} → {} (len {})", i, r.identity, r.track.len());
            }
        }
        drop(state);

        self.metrics.inc(&self.metrics.result_queries);
        results
    }

    pub fn track_count(&self) -> usize {
        self.state.lock().tracks.len()
    }

    /// Clones of the live tracks in track-set order.
    pub fn tracks(&self) -> Vec<Track> {
        self.state.lock().tracks.clone()
    }

    /// Per-track drawing data. Empty unless visual debugging is enabled.
    pub fn debug_snapshot(&self) -> Vec<TrackDebugInfo> {
        let state = self.state.lock();
        if !state.debug.visual_debug {
            return Vec::new();
        }
        state
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| TrackDebugInfo::from_track(i, t))
            .collect()
    }
}
