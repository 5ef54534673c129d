// src/debug.rs
//
// Introspection records for visual debugging. Read-only views of the track
// set; producing them never changes tracking.

use serde::Serialize;

use crate::tracking::{PixelPoint, PredictionRecord, Track};

/// One live track as a visualizer would draw it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackDebugInfo {
    /// Position in the track set at snapshot time (not a stable ID)
    pub index: usize,
    pub last_position: PixelPoint,
    pub observed: bool,
    pub timestamp: f64,
    pub track_len: usize,
    pub led_states: Vec<bool>,
    /// Latest expanded-search prediction in the history, if any
    pub prediction: Option<PredictionRecord>,
}

impl TrackDebugInfo {
    pub fn from_track(index: usize, track: &Track) -> Option<Self> {
        let last = track.last()?;
        let prediction = track
            .observations()
            .iter()
            .rev()
            .find_map(|o| o.prediction.clone());

        Some(Self {
            index,
            last_position: last.position,
            observed: last.observed,
            timestamp: last.timestamp,
            track_len: track.len(),
            led_states: track.led_states(),
            prediction,
        })
    }

    /// One-line summary for log output.
    pub fn describe(&self) -> String {
        let pattern: String = self
            .led_states
            .iter()
            .map(|on| if *on { '1' } else { '0' })
            .collect();

        let mut line = format!(
            "#{} ({:.1},{:.1}) {} len={} [{}]",
            self.index,
            self.last_position.x,
            self.last_position.y,
            if self.observed { "ON" } else { "off" },
            self.track_len,
            pattern
        );

        if let Some(p) = &self.prediction {
            line.push_str(&format!(
                " pred=({:.1},{:.1}) ellipse=({:.1},{:.1})",
                p.predicted.x, p.predicted.y, p.ellipse.half_x, p.ellipse.half_y
            ));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::{Observation, SearchEllipse};

    #[test]
    fn test_describe_plain_track() {
        let mut track = Track::new(Observation::detection(PixelPoint::new(3.0, 4.0), 0.0));
        let placeholder = track.last().unwrap().placeholder(0.1);
        track = Track::from_observations(
            track.observations().iter().cloned().chain(std::iter::once(placeholder)),
        )
        .unwrap();

        let info = TrackDebugInfo::from_track(2, &track).unwrap();
        assert!(!info.observed);
        assert_eq!(info.track_len, 2);
        assert_eq!(info.describe(), "#2 (3.0,4.0) off len=2 [10]");
    }

    #[test]
    fn test_latest_prediction_is_reported() {
        let mut det = Observation::detection(PixelPoint::new(6.0, 0.0), 0.4);
        det.prediction = Some(PredictionRecord {
            predicted: PixelPoint::new(6.0, 0.0),
            ellipse: SearchEllipse {
                half_x: 2.0,
                half_y: 2.0,
            },
            x_coefficients: vec![3.0, 15.0],
            y_coefficients: vec![0.0],
            time_origin: 0.2,
        });
        let track = Track::from_observations(vec![
            Observation::detection(PixelPoint::new(3.0, 0.0), 0.2),
            det,
            Observation::detection(PixelPoint::new(6.5, 0.0), 0.5),
        ])
        .unwrap();

        let info = TrackDebugInfo::from_track(0, &track).unwrap();
        let pred = info.prediction.as_ref().unwrap();
        assert_eq!(pred.time_origin, 0.2);
        assert!(info.describe().ends_with("pred=(6.0,0.0) ellipse=(2.0,2.0)"));
    }
}
