// src/tracking/associator.rs
//
// Per-frame association of detections to tracks.
//
// Design:
//   - Fast pass: axis-aligned pixel gate around each track's last position.
//     First fit in detection order, then track order (not nearest).
//   - Expanded search: for tracks that survived the fast pass unmatched and
//     pass the validity guard, a regression-predicted search ellipse. Again
//     first fit: tracks in order, the first remaining detection inside wins.
//   - Leftover tracks get a placeholder; leftover detections seed new tracks.
//
// Each track takes at most one detection per frame and each detection joins
// at most one track. Callers hold the track-set lock for the whole call.

use super::lifecycle;
use super::observation::{Observation, PixelPoint, Track};
use super::predictor::MotionPredictor;
use crate::types::TrackingConfig;
use tracing::debug;

/// What happened to one frame's detections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssociationOutcome {
    pub fast_matches: usize,
    pub expanded_matches: usize,
    pub placeholders: usize,
    pub new_tracks: usize,
}

#[derive(Debug, Clone)]
pub struct FrameAssociator {
    max_shift_x: f64,
    max_shift_y: f64,
    prediction_margin: f64,
    predictor: MotionPredictor,
    trace: bool,
}

impl FrameAssociator {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            max_shift_x: config.max_pixel_shift_x,
            max_shift_y: config.max_pixel_shift_y,
            prediction_margin: config.prediction_margin,
            predictor: MotionPredictor::new(
                config.decay_factor,
                config.polynomial_order,
                config.confidence_percent,
            ),
            trace: false,
        }
    }

    /// Emit per-candidate debug traces.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    pub fn predictor(&self) -> &MotionPredictor {
        &self.predictor
    }

    fn within_fast_gate(&self, last: &PixelPoint, candidate: &PixelPoint) -> bool {
        let (dx, dy) = last.abs_diff(candidate);
        dx <= self.max_shift_x && dy <= self.max_shift_y
    }

    /// Associate one frame of detections with `tracks`.
    ///
    /// `now` stamps placeholders; `cap` bounds every track's history.
    pub fn associate(
        &self,
        detections: Vec<Observation>,
        tracks: &mut Vec<Track>,
        now: f64,
        cap: usize,
    ) -> AssociationOutcome {
        let mut outcome = AssociationOutcome::default();
        let existing = tracks.len();
        let mut available = vec![true; existing];

        // ── Fast pass ──
        let mut residue: Vec<Observation> = Vec::with_capacity(detections.len());
        for det in detections {
            let hit = (0..existing).find(|&ti| {
                available[ti]
                    && tracks[ti]
                        .last()
                        .map_or(false, |last| self.within_fast_gate(&last.position, &det.position))
            });
            match hit {
                Some(ti) => {
                    tracks[ti].push_capped(det, cap);
                    available[ti] = false;
                    outcome.fast_matches += 1;
                }
                None => residue.push(det),
            }
        }

        // ── Expanded search ──
        if let Some(frame_stamp) = residue.first().map(|d| d.timestamp) {
            let target_time = frame_stamp + self.prediction_margin;
            for ti in 0..existing {
                if residue.is_empty() {
                    break;
                }
                if !available[ti] || !lifecycle::eligible_for_expanded_search(&tracks[ti]) {
                    continue;
                }

                let Some(anchor) = tracks[ti].last().map(|o| o.position) else {
                    continue;
                };
                let prediction = self.predictor.predict(
                    &tracks[ti].motion_samples(),
                    anchor,
                    target_time,
                    self.max_shift_x,
                    self.max_shift_y,
                );
                let record = prediction.to_record();
                if let Some(last) = tracks[ti].last_mut() {
                    last.prediction = Some(record.clone());
                }

                if self.trace {
                    debug!(
                        "🔍 Track {} predicted ({:.1},{:.1}) ellipse ({:.1},{:.1}) fitted={}/{}",
                        ti,
                        record.predicted.x,
                        record.predicted.y,
                        record.ellipse.half_x,
                        record.ellipse.half_y,
                        prediction.x.is_fitted(),
                        prediction.y.is_fitted()
                    );
                }

                if let Some(di) = residue.iter().position(|d| prediction.accepts(&d.position)) {
                    let mut det = residue.remove(di);
                    debug!(
                        "🔗 Expanded match: track {} ← ({:.1},{:.1}), predicted ({:.1},{:.1})",
                        ti, det.position.x, det.position.y, record.predicted.x, record.predicted.y
                    );
                    det.prediction = Some(record);
                    tracks[ti].push_capped(det, cap);
                    available[ti] = false;
                    outcome.expanded_matches += 1;
                }
            }
        }

        // ── Unmatched tracks → placeholder ──
        for ti in 0..existing {
            if available[ti]
                && lifecycle::needs_placeholder(&tracks[ti])
                && lifecycle::insert_placeholder(&mut tracks[ti], now, cap)
            {
                outcome.placeholders += 1;
            }
        }

        // ── Unmatched detections → new tracks ──
        for det in residue {
            if self.trace {
                debug!(
                    "🆕 New track at ({:.1},{:.1}) t={:.3}",
                    det.position.x, det.position.y, det.timestamp
                );
            }
            tracks.push(Track::new(det));
            outcome.new_tracks += 1;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(shift: f64, order: usize) -> TrackingConfig {
        TrackingConfig {
            max_pixel_shift_x: shift,
            max_pixel_shift_y: shift,
            polynomial_order: order,
            ..TrackingConfig::default()
        }
    }

    fn det(x: f64, y: f64, t: f64) -> Observation {
        Observation::detection(PixelPoint::new(x, y), t)
    }

    #[test]
    fn test_fast_gate_extends_track() {
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut tracks = vec![Track::new(det(10.0, 10.0, 0.0))];
        let out = assoc.associate(vec![det(12.0, 8.0, 0.1)], &mut tracks, 0.1, 12);
        assert_eq!(out.fast_matches, 1);
        assert_eq!(out.new_tracks, 0);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 2);
    }

    #[test]
    fn test_fast_gate_is_rectangular() {
        // (2,2) offset is 2.83 px away but inside the 2×2 gate
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut tracks = vec![Track::new(det(0.0, 0.0, 0.0)), Track::new(det(50.0, 0.0, 0.0))];
        let out = assoc.associate(vec![det(2.0, 2.0, 0.1)], &mut tracks, 0.1, 12);
        assert_eq!(out.fast_matches, 1);
        assert_eq!(tracks[0].last().unwrap().position, PixelPoint::new(2.0, 2.0));
    }

    #[test]
    fn test_fast_pass_is_first_fit() {
        // Both tracks gate the detection; the first in order wins even
        // though the second is closer.
        let assoc = FrameAssociator::new(&config(3.0, 2));
        let mut tracks = vec![Track::new(det(0.0, 0.0, 0.0)), Track::new(det(2.0, 0.0, 0.0))];
        assoc.associate(vec![det(2.5, 0.0, 0.1)], &mut tracks, 0.1, 12);
        assert_eq!(tracks[0].len(), 2);
        assert!(tracks[0].last().unwrap().observed);
        assert_eq!(tracks[1].len(), 2);
        assert!(!tracks[1].last().unwrap().observed, "second track got a placeholder");
    }

    #[test]
    fn test_one_detection_per_track() {
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut tracks = vec![Track::new(det(0.0, 0.0, 0.0))];
        let out = assoc.associate(
            vec![det(0.5, 0.0, 0.1), det(1.0, 0.0, 0.1)],
            &mut tracks,
            0.1,
            12,
        );
        assert_eq!(out.fast_matches, 1);
        assert_eq!(out.new_tracks, 1);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].last().unwrap().position.x, 0.5);
        assert_eq!(tracks[1].len(), 1);
    }

    #[test]
    fn test_unmatched_track_gets_placeholder() {
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut tracks = vec![Track::new(det(5.0, 5.0, 0.0))];
        let out = assoc.associate(Vec::new(), &mut tracks, 0.1, 12);
        assert_eq!(out.placeholders, 1);
        let last = tracks[0].last().unwrap();
        assert!(!last.observed);
        assert_eq!(last.position, PixelPoint::new(5.0, 5.0));
        assert_eq!(last.timestamp, 0.1);
    }

    #[test]
    fn test_dead_track_gets_no_placeholder() {
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut track = Track::new(det(5.0, 5.0, 0.0));
        for t in 1..4 {
            lifecycle::insert_placeholder(&mut track, t as f64 * 0.1, 12);
        }
        let mut tracks = vec![track];
        let out = assoc.associate(Vec::new(), &mut tracks, 0.4, 12);
        assert_eq!(out.placeholders, 0);
        assert_eq!(tracks[0].len(), 4);
    }

    #[test]
    fn test_expanded_search_follows_motion() {
        // Moves 1.5 px/frame, off for one frame, then reappears 3 px away
        let assoc = FrameAssociator::new(&config(2.0, 1));
        let mut tracks = Vec::new();
        assoc.associate(vec![det(0.0, 0.0, 0.0)], &mut tracks, 0.0, 12);
        assoc.associate(vec![det(1.5, 0.0, 0.1)], &mut tracks, 0.1, 12);
        assoc.associate(vec![det(3.0, 0.0, 0.2)], &mut tracks, 0.2, 12);
        assoc.associate(Vec::new(), &mut tracks, 0.3, 12);
        assert_eq!(tracks.len(), 1);

        let out = assoc.associate(vec![det(6.0, 0.0, 0.4)], &mut tracks, 0.4, 12);
        assert_eq!(out.expanded_matches, 1, "{:?}", out);
        assert_eq!(out.new_tracks, 0);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].led_states(), vec![true, true, true, false, true]);

        // The matched detection and the placeholder before it carry the prediction
        let last = tracks[0].last().unwrap();
        let record = last.prediction.as_ref().unwrap();
        assert!((record.predicted.x - 6.0).abs() < 1e-6);
        let before = &tracks[0].observations()[3];
        assert_eq!(before.prediction.as_ref(), Some(record));
    }

    #[test]
    fn test_outside_ellipse_starts_new_track() {
        let assoc = FrameAssociator::new(&config(2.0, 1));
        let mut tracks = Vec::new();
        assoc.associate(vec![det(0.0, 0.0, 0.0)], &mut tracks, 0.0, 12);
        assoc.associate(vec![det(1.5, 0.0, 0.1)], &mut tracks, 0.1, 12);
        assoc.associate(vec![det(3.0, 0.0, 0.2)], &mut tracks, 0.2, 12);
        assoc.associate(Vec::new(), &mut tracks, 0.3, 12);

        // Predicted x = 6 with half-extent 2; 9 is outside
        let out = assoc.associate(vec![det(9.0, 0.0, 0.4)], &mut tracks, 0.4, 12);
        assert_eq!(out.expanded_matches, 0);
        assert_eq!(out.new_tracks, 1);
        assert_eq!(tracks.len(), 2);
        assert!(!tracks[0].last().unwrap().observed);
    }

    #[test]
    fn test_consecutive_detections_skip_expanded_search() {
        // Last two entries observed → the guard keeps the track out of
        // expanded search even if a detection sits on its extrapolation.
        let assoc = FrameAssociator::new(&config(2.0, 1));
        let mut tracks = Vec::new();
        assoc.associate(vec![det(0.0, 0.0, 0.0)], &mut tracks, 0.0, 12);
        assoc.associate(vec![det(1.5, 0.0, 0.1)], &mut tracks, 0.1, 12);
        let out = assoc.associate(vec![det(4.5, 0.0, 0.2)], &mut tracks, 0.2, 12);
        assert_eq!(out.expanded_matches, 0);
        assert_eq!(out.new_tracks, 1);
        assert!(tracks[0].last().unwrap().prediction.is_none());
    }

    #[test]
    fn test_expanded_search_takes_first_detection_inside() {
        let assoc = FrameAssociator::new(&config(2.0, 1));
        let mut tracks = Vec::new();
        assoc.associate(vec![det(0.0, 0.0, 0.0)], &mut tracks, 0.0, 12);
        assoc.associate(vec![det(1.5, 0.0, 0.1)], &mut tracks, 0.1, 12);
        assoc.associate(vec![det(3.0, 0.0, 0.2)], &mut tracks, 0.2, 12);
        assoc.associate(Vec::new(), &mut tracks, 0.3, 12);

        // Both candidates are inside the gate around x = 6; the first listed
        // wins even though the second is exactly on the prediction.
        let out = assoc.associate(
            vec![det(7.5, 0.0, 0.4), det(6.0, 0.0, 0.4)],
            &mut tracks,
            0.4,
            12,
        );
        assert_eq!(out.expanded_matches, 1);
        assert_eq!(out.new_tracks, 1);
        assert_eq!(tracks[0].last().unwrap().position.x, 7.5);
        assert_eq!(tracks[1].last().unwrap().position.x, 6.0);
    }

    #[test]
    fn test_cap_enforced_on_every_append() {
        let assoc = FrameAssociator::new(&config(2.0, 2));
        let mut tracks = Vec::new();
        for i in 0..20 {
            let t = i as f64 * 0.1;
            let frame = if i % 2 == 0 { vec![det(1.0, 1.0, t)] } else { Vec::new() };
            assoc.associate(frame, &mut tracks, t, 6);
            assert!(tracks.iter().all(|tr| tr.len() <= 6));
        }
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].len(), 6);
    }
}
