// src/tracking/mod.rs
//
// Online association and predictive tracking of blinking markers.
//
// Signal flow (per frame):
//   Detections → associator (fast gate) ─┬→ extended track
//                                        └→ associator (predictor ellipse) ─┬→ extended track
//                                                                           └→ new track
//   Unmatched tracks → lifecycle (placeholder) → lifecycle (prune)
//
// Owned and locked by tracker::BlinkTracker.

pub mod associator;
pub mod lifecycle;
pub mod observation;
pub mod predictor;
pub mod tracker;

pub use associator::{AssociationOutcome, FrameAssociator};
pub use lifecycle::PruneReason;
pub use observation::{MotionSamples, Observation, PixelPoint, PredictionRecord, SearchEllipse, Track};
pub use predictor::{AxisPrediction, MotionPrediction, MotionPredictor};
pub use tracker::{BlinkTracker, TrackResult};
