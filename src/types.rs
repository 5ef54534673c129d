use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub identity: IdentityConfig,
    pub framerate: FramerateConfig,
    pub debug: DebugConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Steepness of the exponential time decay applied to history samples (1/s)
    pub decay_factor: f64,
    /// Degree of the per-axis motion polynomial
    pub polynomial_order: usize,
    /// Fast-pass gate half-width in x (pixels)
    pub max_pixel_shift_x: f64,
    /// Fast-pass gate half-height in y (pixels)
    pub max_pixel_shift_y: f64,
    /// Lookahead added to the frame stamp before prediction (seconds)
    pub prediction_margin: f64,
    /// History cap = reference_length × buffer_growth_factor
    pub buffer_growth_factor: f64,
    /// Confidence level of the regression search ellipse, in percent
    pub confidence_percent: f64,
    /// Framerate assumed until the first estimate arrives (Hz)
    pub initial_framerate: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            decay_factor: 1.0,
            polynomial_order: 2,
            max_pixel_shift_x: 3.0,
            max_pixel_shift_y: 3.0,
            prediction_margin: 0.0,
            buffer_growth_factor: 3.0,
            confidence_percent: 75.0,
            initial_framerate: 60.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Reference on/off codes written as strings of '0' and '1'
    pub sequences: Vec<String>,
    /// Minimum fraction of agreeing bits for a code to be reported
    pub min_match_ratio: f64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            sequences: Vec::new(),
            min_match_ratio: 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerateConfig {
    /// Frames per framerate estimate
    pub sample_count: usize,
}

impl Default for FramerateConfig {
    fn default() -> Self {
        Self { sample_count: 30 }
    }
}

/// Introspection toggles. Neither changes tracking behaviour.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub debug: bool,
    pub visual_debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Period of the concurrent result query in the replay binary
    pub poll_interval_ms: u64,
    /// Sleep between frames to reproduce the recorded frame timing
    pub realtime: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            realtime: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One line of a replay file: a frame stamp and the points detected in it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameRecord {
    pub stamp: f64,
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
}
