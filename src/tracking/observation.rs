// src/tracking/observation.rs
//
// Per-frame records and the tracks built from them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Image position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Per-axis absolute difference.
    pub fn abs_diff(&self, other: &PixelPoint) -> (f64, f64) {
        ((self.x - other.x).abs(), (self.y - other.y).abs())
    }
}

impl From<[f64; 2]> for PixelPoint {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

impl From<(f64, f64)> for PixelPoint {
    fn from(p: (f64, f64)) -> Self {
        Self::new(p.0, p.1)
    }
}

/// Axis-aligned search region half-extents around a predicted position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SearchEllipse {
    pub half_x: f64,
    pub half_y: f64,
}

impl SearchEllipse {
    /// Strict per-axis containment of `candidate` around `center`.
    pub fn contains(&self, center: &PixelPoint, candidate: &PixelPoint) -> bool {
        let (dx, dy) = center.abs_diff(candidate);
        dx < self.half_x && dy < self.half_y
    }
}

/// Prediction recorded by expanded search, kept for introspection only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub predicted: PixelPoint,
    pub ellipse: SearchEllipse,
    /// Polynomial coefficients (ascending powers) of x(t - time_origin);
    /// empty when the fallback statistics were used.
    pub x_coefficients: Vec<f64>,
    pub y_coefficients: Vec<f64>,
    /// Stamp of the newest sample the fit was built from.
    pub time_origin: f64,
}

/// One frame's entry in a track: a detection or a synthesized placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub position: PixelPoint,
    /// `true` for a real detection, `false` for a gap filler
    pub observed: bool,
    /// Seconds
    pub timestamp: f64,
    pub prediction: Option<PredictionRecord>,
}

impl Observation {
    pub fn detection(position: PixelPoint, timestamp: f64) -> Self {
        Self {
            position,
            observed: true,
            timestamp,
            prediction: None,
        }
    }

    /// Gap filler at this observation's position.
    pub fn placeholder(&self, timestamp: f64) -> Self {
        Self {
            position: self.position,
            observed: false,
            timestamp,
            prediction: None,
        }
    }
}

/// Observed-only samples of a track, oldest first, ready for regression.
#[derive(Debug, Clone, Default)]
pub struct MotionSamples {
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
    pub times: Vec<f64>,
}

impl MotionSamples {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Time-ordered history of one hypothesized marker.
///
/// Never empty: a track is born from a detection and only ever grows or
/// evicts from the front while staying above its cap of at least one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    observations: VecDeque<Observation>,
}

impl Track {
    pub fn new(first: Observation) -> Self {
        let mut observations = VecDeque::with_capacity(16);
        observations.push_back(first);
        Self { observations }
    }

    /// Build a track from an existing history (oldest first).
    /// Returns `None` for an empty history.
    pub fn from_observations<I>(history: I) -> Option<Self>
    where
        I: IntoIterator<Item = Observation>,
    {
        let observations: VecDeque<Observation> = history.into_iter().collect();
        if observations.is_empty() {
            None
        } else {
            Some(Self { observations })
        }
    }

    pub fn observations(&self) -> &VecDeque<Observation> {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.back()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Observation> {
        self.observations.back_mut()
    }

    /// Append and evict the oldest entries beyond `cap`. Returns evictions.
    pub(crate) fn push_capped(&mut self, observation: Observation, cap: usize) -> usize {
        self.observations.push_back(observation);
        self.enforce_cap(cap)
    }

    /// Evict the oldest entries beyond `cap` (at least one entry stays).
    pub(crate) fn enforce_cap(&mut self, cap: usize) -> usize {
        let cap = cap.max(1);
        let mut evicted = 0;
        while self.observations.len() > cap {
            self.observations.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Observed flags of the newest `n` entries (or all, if shorter), oldest first.
    pub fn recent_states(&self, n: usize) -> Vec<bool> {
        let skip = self.observations.len().saturating_sub(n);
        self.observations
            .iter()
            .skip(skip)
            .map(|o| o.observed)
            .collect()
    }

    /// All observed flags, oldest first.
    pub fn led_states(&self) -> Vec<bool> {
        self.observations.iter().map(|o| o.observed).collect()
    }

    /// Positions and stamps of real detections; placeholders are excluded.
    pub fn motion_samples(&self) -> MotionSamples {
        let mut samples = MotionSamples::default();
        for o in self.observations.iter().filter(|o| o.observed) {
            samples.xs.push(o.position.x);
            samples.ys.push(o.position.y);
            samples.times.push(o.timestamp);
        }
        samples
    }

    /// True when the newest `n` entries exist and all have `observed == state`.
    pub fn tail_all(&self, n: usize, state: bool) -> bool {
        self.observations.len() >= n
            && self
                .observations
                .iter()
                .rev()
                .take(n)
                .all(|o| o.observed == state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(x: f64, t: f64) -> Observation {
        Observation::detection(PixelPoint::new(x, 0.0), t)
    }

    #[test]
    fn test_push_capped_evicts_oldest() {
        let mut track = Track::new(det(0.0, 0.0));
        for i in 1..6 {
            track.push_capped(det(i as f64, i as f64), 4);
        }
        assert_eq!(track.len(), 4);
        assert_eq!(track.observations().front().unwrap().position.x, 2.0);
        assert_eq!(track.last().unwrap().position.x, 5.0);
    }

    #[test]
    fn test_placeholder_copies_position() {
        let o = det(7.0, 1.0);
        let p = o.placeholder(1.5);
        assert!(!p.observed);
        assert_eq!(p.position, o.position);
        assert_eq!(p.timestamp, 1.5);
    }

    #[test]
    fn test_motion_samples_skip_placeholders() {
        let mut track = Track::new(det(1.0, 0.0));
        let ph = track.last().unwrap().placeholder(0.1);
        track.push_capped(ph, 10);
        track.push_capped(det(3.0, 0.2), 10);
        let s = track.motion_samples();
        assert_eq!(s.xs, vec![1.0, 3.0]);
        assert_eq!(s.times, vec![0.0, 0.2]);
    }

    #[test]
    fn test_recent_states_and_tail() {
        let mut track = Track::new(det(0.0, 0.0));
        for t in 1..4 {
            let ph = track.last().unwrap().placeholder(t as f64);
            track.push_capped(ph, 10);
        }
        assert_eq!(track.led_states(), vec![true, false, false, false]);
        assert_eq!(track.recent_states(2), vec![false, false]);
        assert_eq!(track.recent_states(10).len(), 4);
        assert!(track.tail_all(3, false));
        assert!(!track.tail_all(4, false));
        assert!(!track.tail_all(5, false));
    }

    #[test]
    fn test_ellipse_containment_is_strict() {
        let e = SearchEllipse {
            half_x: 2.0,
            half_y: 1.0,
        };
        let c = PixelPoint::new(10.0, 10.0);
        assert!(e.contains(&c, &PixelPoint::new(11.9, 10.5)));
        assert!(!e.contains(&c, &PixelPoint::new(12.0, 10.0)));
        assert!(!e.contains(&c, &PixelPoint::new(10.0, 11.0)));
    }

    #[test]
    fn test_from_observations_rejects_empty() {
        assert!(Track::from_observations(Vec::new()).is_none());
        let t = Track::from_observations(vec![det(0.0, 0.0), det(1.0, 0.1)]).unwrap();
        assert_eq!(t.len(), 2);
    }
}
