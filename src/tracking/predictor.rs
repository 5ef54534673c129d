// src/tracking/predictor.rs
//
// Motion prediction for tracks that jumped past the fast-pass gate.
//
// Per axis, independently:
//   1. Exponential time-decay weights, newest sample = 1.
//   2. Weighted mean and weighted standard deviation of the coordinate.
//   3. Weighted least-squares polynomial of coordinate vs. time, evaluated
//      at the target time.
//   4. Search half-extent from the confidence interval of the residuals.
//
// When the fit is impossible (too few samples, singular system, all-zero
// coefficients) the axis falls back to the weighted mean with a half-extent
// of 2 × max(std, pixel threshold).
//
// Time is re-expressed relative to the newest sample before fitting, and
// scaled to [-1, 0] while solving, so absolute epoch stamps do not wreck the
// normal equations.

use super::observation::{MotionSamples, PixelPoint, PredictionRecord, SearchEllipse};

/// Weight sums below this are treated as empty.
const MIN_WEIGHT_SUM: f64 = 1e-12;

/// Relative pivot magnitude under which the normal equations count as singular.
const SINGULAR_PIVOT_RATIO: f64 = 1e-12;

// ============================================================================
// PREDICTION RESULT
// ============================================================================

/// Prediction for one image axis.
#[derive(Debug, Clone, PartialEq)]
pub enum AxisPrediction {
    /// Regression succeeded
    Fitted {
        /// Ascending powers of (t - time_origin)
        coefficients: Vec<f64>,
        predicted: f64,
        half_extent: f64,
    },
    /// Statistics-only prediction
    Fallback { mean: f64, half_extent: f64 },
}

impl AxisPrediction {
    pub fn predicted(&self) -> f64 {
        match self {
            Self::Fitted { predicted, .. } => *predicted,
            Self::Fallback { mean, .. } => *mean,
        }
    }

    pub fn half_extent(&self) -> f64 {
        match self {
            Self::Fitted { half_extent, .. } | Self::Fallback { half_extent, .. } => *half_extent,
        }
    }

    pub fn coefficients(&self) -> &[f64] {
        match self {
            Self::Fitted { coefficients, .. } => coefficients,
            Self::Fallback { .. } => &[],
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, Self::Fitted { .. })
    }
}

/// Predicted position and search region for one track.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPrediction {
    pub x: AxisPrediction,
    pub y: AxisPrediction,
    pub time_origin: f64,
}

impl MotionPrediction {
    pub fn predicted(&self) -> PixelPoint {
        PixelPoint::new(self.x.predicted(), self.y.predicted())
    }

    pub fn ellipse(&self) -> SearchEllipse {
        SearchEllipse {
            half_x: self.x.half_extent(),
            half_y: self.y.half_extent(),
        }
    }

    /// Whether `candidate` lies strictly inside the search region.
    pub fn accepts(&self, candidate: &PixelPoint) -> bool {
        self.ellipse().contains(&self.predicted(), candidate)
    }

    pub fn to_record(&self) -> PredictionRecord {
        PredictionRecord {
            predicted: self.predicted(),
            ellipse: self.ellipse(),
            x_coefficients: self.x.coefficients().to_vec(),
            y_coefficients: self.y.coefficients().to_vec(),
            time_origin: self.time_origin,
        }
    }
}

// ============================================================================
// PREDICTOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct MotionPredictor {
    decay_factor: f64,
    polynomial_order: usize,
    confidence_percent: f64,
    /// Two-sided normal critical value for `confidence_percent`
    critical_value: f64,
}

impl MotionPredictor {
    pub fn new(decay_factor: f64, polynomial_order: usize, confidence_percent: f64) -> Self {
        let p = 0.5 + confidence_percent.clamp(0.0, 100.0) / 200.0;
        Self {
            decay_factor,
            polynomial_order,
            confidence_percent,
            critical_value: normal_quantile(p),
        }
    }

    pub fn polynomial_order(&self) -> usize {
        self.polynomial_order
    }

    pub fn confidence_percent(&self) -> f64 {
        self.confidence_percent
    }

    /// exp(-decay × age), age measured from the newest stamp.
    pub fn weights(&self, times: &[f64]) -> Vec<f64> {
        let newest = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        times
            .iter()
            .map(|t| (-self.decay_factor * (newest - t).max(0.0)).exp())
            .collect()
    }

    /// Predict one coordinate at `target_time`.
    ///
    /// `values` and `times` are parallel, oldest first, and must be non-empty.
    pub fn predict_axis(
        &self,
        values: &[f64],
        times: &[f64],
        target_time: f64,
        axis_threshold: f64,
    ) -> AxisPrediction {
        let weights = self.weights(times);
        let mean = weighted_mean(values, &weights);
        let std = weighted_std(values, &weights, mean);
        let fallback = AxisPrediction::Fallback {
            mean,
            half_extent: 2.0 * std.max(axis_threshold),
        };

        if values.len() <= self.polynomial_order {
            return fallback;
        }

        let origin = times.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let rel_times: Vec<f64> = times.iter().map(|t| t - origin).collect();

        let coefficients =
            match weighted_polyfit(&rel_times, values, &weights, self.polynomial_order) {
                Some(c) if c.iter().any(|v| *v != 0.0) => c,
                _ => return fallback,
            };

        let predicted = eval_polynomial(&coefficients, target_time - origin);
        let radius = self.confidence_radius(&coefficients, &rel_times, values, &weights);

        AxisPrediction::Fitted {
            coefficients,
            predicted,
            half_extent: radius.max(axis_threshold),
        }
    }

    /// Predict both axes of a track.
    ///
    /// `anchor` stands in for the history when a track has no observed
    /// samples left in its window.
    pub fn predict(
        &self,
        samples: &MotionSamples,
        anchor: PixelPoint,
        target_time: f64,
        threshold_x: f64,
        threshold_y: f64,
    ) -> MotionPrediction {
        if samples.is_empty() {
            return MotionPrediction {
                x: AxisPrediction::Fallback {
                    mean: anchor.x,
                    half_extent: 2.0 * threshold_x,
                },
                y: AxisPrediction::Fallback {
                    mean: anchor.y,
                    half_extent: 2.0 * threshold_y,
                },
                time_origin: target_time,
            };
        }

        let time_origin = samples
            .times
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);

        MotionPrediction {
            x: self.predict_axis(&samples.xs, &samples.times, target_time, threshold_x),
            y: self.predict_axis(&samples.ys, &samples.times, target_time, threshold_y),
            time_origin,
        }
    }

    /// Critical value × weighted residual standard error.
    fn confidence_radius(
        &self,
        coefficients: &[f64],
        rel_times: &[f64],
        values: &[f64],
        weights: &[f64],
    ) -> f64 {
        let sum_w: f64 = weights.iter().sum();
        if sum_w < MIN_WEIGHT_SUM {
            return 0.0;
        }

        let sse: f64 = rel_times
            .iter()
            .zip(values)
            .zip(weights)
            .map(|((t, v), w)| {
                let r = v - eval_polynomial(coefficients, *t);
                w * r * r
            })
            .sum();

        // Residual degrees of freedom: n - (order + 1)
        let n = values.len();
        let params = coefficients.len();
        let dof_scale = if n > params {
            n as f64 / (n - params) as f64
        } else {
            1.0
        };

        self.critical_value * (sse / sum_w * dof_scale).sqrt()
    }
}

// ============================================================================
// WEIGHTED STATISTICS
// ============================================================================

pub fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum_w: f64 = weights.iter().sum();
    if sum_w < MIN_WEIGHT_SUM {
        return values.iter().sum::<f64>() / values.len() as f64;
    }
    values.iter().zip(weights).map(|(v, w)| v * w).sum::<f64>() / sum_w
}

/// Weighted standard deviation with the (M-1)/M correction, M being the
/// number of non-zero weights. Zero for fewer than two weighted samples.
pub fn weighted_std(values: &[f64], weights: &[f64], mean: f64) -> f64 {
    let sum_w: f64 = weights.iter().sum();
    let nonzero = weights.iter().filter(|w| **w > 0.0).count();
    if nonzero < 2 || sum_w < MIN_WEIGHT_SUM {
        return 0.0;
    }

    let m = nonzero as f64;
    let numerator: f64 = values
        .iter()
        .zip(weights)
        .map(|(v, w)| w * (v - mean).powi(2))
        .sum();
    (numerator / ((m - 1.0) / m * sum_w)).sqrt()
}

// ============================================================================
// POLYNOMIAL REGRESSION (Weighted Least Squares)
// ============================================================================

/// Fit y = Σ c_k t^k (k = 0..=order) minimizing Σ w (y - ŷ)².
///
/// Returns None if the normal equations are singular or the result is not
/// finite.
pub fn weighted_polyfit(
    times: &[f64],
    values: &[f64],
    weights: &[f64],
    order: usize,
) -> Option<Vec<f64>> {
    let params = order + 1;
    if times.len() < params || times.len() != values.len() || times.len() != weights.len() {
        return None;
    }

    // Scale time into [-1, 1] for conditioning; undone on the way out.
    let span = times.iter().fold(0.0f64, |m, t| m.max(t.abs()));
    let scale = if span > 0.0 { span } else { 1.0 };

    // Normal equations: (Xᵀ W X) c = Xᵀ W y
    let mut ata = vec![vec![0.0f64; params]; params];
    let mut atb = vec![0.0f64; params];
    let mut powers = vec![0.0f64; 2 * params - 1];

    for ((t, y), w) in times.iter().zip(values).zip(weights) {
        let u = t / scale;
        let mut p = 1.0;
        for slot in powers.iter_mut() {
            *slot = p;
            p *= u;
        }
        for j in 0..params {
            atb[j] += w * y * powers[j];
            for k in 0..params {
                ata[j][k] += w * powers[j + k];
            }
        }
    }

    let scaled = solve_linear_system(ata, atb)?;

    let mut coefficients = Vec::with_capacity(params);
    let mut factor = 1.0;
    for c in scaled {
        coefficients.push(c / factor);
        factor *= scale;
    }

    if coefficients.iter().all(|c| c.is_finite()) {
        Some(coefficients)
    } else {
        None
    }
}

/// Horner evaluation of ascending-power coefficients.
pub fn eval_polynomial(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}

/// Solve an N×N system by Gaussian elimination with partial pivoting.
/// Returns None if the system is singular.
fn solve_linear_system(mut m: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Option<Vec<f64>> {
    let n = rhs.len();
    let magnitude = m
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, v| acc.max(v.abs()));
    if magnitude == 0.0 || !magnitude.is_finite() {
        return None;
    }
    let tolerance = magnitude * SINGULAR_PIVOT_RATIO;

    // Forward elimination
    for col in 0..n {
        let mut max_row = col;
        let mut max_val = m[col][col].abs();
        for row in (col + 1)..n {
            if m[row][col].abs() > max_val {
                max_val = m[row][col].abs();
                max_row = row;
            }
        }

        if max_val < tolerance {
            return None;
        }

        if max_row != col {
            m.swap(col, max_row);
            rhs.swap(col, max_row);
        }

        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            for j in col..n {
                m[row][j] -= factor * m[col][j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0f64; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|j| m[row][j] * x[j]).sum();
        x[row] = (rhs[row] - tail) / m[row][row];
    }

    if x.iter().all(|v| v.is_finite()) {
        Some(x)
    } else {
        None
    }
}

/// Inverse standard normal CDF (Acklam's rational approximation,
/// relative error below 1.2e-9).
pub fn normal_quantile(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let tail = |q: f64| {
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    if p < P_LOW {
        tail((-2.0 * p.ln()).sqrt())
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -tail((-2.0 * (1.0 - p).ln()).sqrt())
    }
}

// ============================================================================
// TESTS
// ============================================================================
