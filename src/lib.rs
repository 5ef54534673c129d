// src/lib.rs
//
// Blinking-marker tracker.
//
// Signal flow (once per camera frame):
//   Detected points → tracking::associator (fast gate → predicted ellipse gate)
//                   → tracking::lifecycle (placeholders, caps, pruning)
//   Any time        → BlinkTracker::get_results → identity matcher
//
// Point detection upstream and message decoding downstream live elsewhere.

pub mod clock;
pub mod config;
pub mod debug;
pub mod error;
pub mod framerate;
pub mod identity;
pub mod pipeline;
pub mod tracking;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TrackerError};
pub use identity::{CrossCorrelationMatcher, Identity, SignalMatcher};
pub use tracking::{BlinkTracker, Observation, PixelPoint, Track, TrackResult};
pub use types::Config;
