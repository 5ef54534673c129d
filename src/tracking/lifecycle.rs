// src/tracking/lifecycle.rs
//
// Track lifecycle: history caps, gap placeholders, validity guard, pruning.

use super::observation::{Observation, Track};
use crate::identity::DEAD_RUN_LENGTH;
use tracing::debug;

/// Staleness window used until a framerate is known (seconds).
pub const DEFAULT_TIMING_TOLERANCE: f64 = 5.0 / 60.0;

/// A track untouched for this many frame periods is stale.
pub const STALE_FRAME_PERIODS: f64 = 4.0;

/// Maximum retained observations per track.
pub fn history_cap(reference_length: usize, growth_factor: f64) -> usize {
    ((reference_length as f64 * growth_factor).floor() as usize).max(1)
}

/// Staleness window: 4 frame periods, or the default without a framerate.
pub fn timing_tolerance(framerate: Option<f64>) -> f64 {
    match framerate {
        Some(fr) if fr > 0.0 => STALE_FRAME_PERIODS / fr,
        _ => DEFAULT_TIMING_TOLERANCE,
    }
}

/// Newest three entries are all placeholders.
pub fn is_structurally_dead(track: &Track) -> bool {
    track.tail_all(DEAD_RUN_LENGTH, false)
}

/// Validity guard for expanded search.
///
/// Excluded: tracks whose last two entries were both detections (no gap is
/// expected, so no wider search is needed) and structurally dead tracks.
pub fn eligible_for_expanded_search(track: &Track) -> bool {
    !track.tail_all(2, true) && !is_structurally_dead(track)
}

/// Unmatched tracks receive a placeholder unless already dead.
pub fn needs_placeholder(track: &Track) -> bool {
    !is_structurally_dead(track)
}

/// Append a gap filler at the last known position. Returns false if the
/// track has no entries to copy from.
pub fn insert_placeholder(track: &mut Track, now: f64, cap: usize) -> bool {
    let placeholder: Option<Observation> = track.last().map(|last| last.placeholder(now));
    match placeholder {
        Some(p) => {
            track.push_capped(p, cap);
            true
        }
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PruneReason {
    /// Three consecutive placeholders
    DeadPattern,
    /// Last entry older than the timing tolerance
    Stale { age: f64 },
}

pub fn prune_reason(track: &Track, now: f64, tolerance: f64) -> Option<PruneReason> {
    let last = track.last()?;

    if is_structurally_dead(track) {
        return Some(PruneReason::DeadPattern);
    }

    let age = (now - last.timestamp).abs();
    if age > tolerance {
        return Some(PruneReason::Stale { age });
    }

    None
}

/// Remove dead and stale tracks. Returns the number removed.
pub fn prune_tracks(tracks: &mut Vec<Track>, now: f64, tolerance: f64) -> usize {
    let before = tracks.len();
    tracks.retain(|t| match prune_reason(t, now, tolerance) {
        Some(PruneReason::DeadPattern) => {
            debug!(
                "🗑️  Track pruned (3 placeholders) len={} at {:?}",
                t.len(),
                t.last().map(|o| o.position)
            );
            false
        }
        Some(PruneReason::Stale { age }) => {
            debug!(
                "🗑️  Track pruned (stale {:.3}s > {:.3}s) len={}",
                age,
                tolerance,
                t.len()
            );
            false
        }
        None => true,
    });
    before - tracks.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::observation::PixelPoint;

    fn track_with(states: &[bool], dt: f64) -> Track {
        let mut history = Vec::new();
        for (i, on) in states.iter().enumerate() {
            let mut o = Observation::detection(PixelPoint::new(1.0, 1.0), i as f64 * dt);
            o.observed = *on;
            history.push(o);
        }
        Track::from_observations(history).unwrap()
    }

    #[test]
    fn test_history_cap() {
        assert_eq!(history_cap(4, 3.0), 12);
        assert_eq!(history_cap(5, 1.5), 7);
        assert_eq!(history_cap(0, 3.0), 1);
    }

    #[test]
    fn test_timing_tolerance() {
        assert!((timing_tolerance(Some(10.0)) - 0.4).abs() < 1e-12);
        assert!((timing_tolerance(None) - 5.0 / 60.0).abs() < 1e-12);
        assert!((timing_tolerance(Some(0.0)) - 5.0 / 60.0).abs() < 1e-12);
    }

    #[test]
    fn test_validity_guard() {
        assert!(eligible_for_expanded_search(&track_with(&[true], 0.1)));
        assert!(eligible_for_expanded_search(&track_with(&[true, false], 0.1)));
        assert!(eligible_for_expanded_search(&track_with(&[true, false, false], 0.1)));
        assert!(!eligible_for_expanded_search(&track_with(&[false, true, true], 0.1)));
        assert!(!eligible_for_expanded_search(&track_with(&[true, false, false, false], 0.1)));
    }

    #[test]
    fn test_placeholder_guard_allows_consecutive_on() {
        // Patterns like 1100 need a placeholder after two detections
        assert!(needs_placeholder(&track_with(&[true, true], 0.1)));
        assert!(!needs_placeholder(&track_with(&[false, false, false], 0.1)));
    }

    #[test]
    fn test_insert_placeholder_respects_cap() {
        let mut t = track_with(&[true, false, true], 0.1);
        assert!(insert_placeholder(&mut t, 0.3, 3));
        assert_eq!(t.len(), 3);
        assert_eq!(t.led_states(), vec![false, true, false]);
        assert_eq!(t.last().unwrap().timestamp, 0.3);
    }

    #[test]
    fn test_prune_dead_pattern() {
        let mut tracks = vec![
            track_with(&[true, false, false, false], 0.1),
            track_with(&[true, false, false], 0.1),
        ];
        let removed = prune_tracks(&mut tracks, 0.3, 1.0);
        assert_eq!(removed, 1);
        assert_eq!(tracks[0].len(), 3);
    }

    #[test]
    fn test_prune_stale() {
        let mut tracks = vec![track_with(&[true], 0.1)];
        // Last stamp 0.0, tolerance 0.4
        assert_eq!(prune_tracks(&mut tracks, 0.39, 0.4), 0);
        assert_eq!(prune_tracks(&mut tracks, 0.41, 0.4), 1);
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_prune_reason_reports_age() {
        let t = track_with(&[true, true], 0.1);
        match prune_reason(&t, 1.1, 0.5) {
            Some(PruneReason::Stale { age }) => assert!((age - 1.0).abs() < 1e-9),
            other => panic!("expected stale, got {:?}", other),
        }
    }
}
