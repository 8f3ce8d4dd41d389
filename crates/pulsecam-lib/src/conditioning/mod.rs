//! Detrending and zero-phase band-limiting of the raw color trace.

pub mod butterworth;

use crate::config::FilterConfig;
use crate::signal::SignalTrace;
use butterworth::SosFilter;
use serde::{Deserialize, Serialize};

/// Smallest and largest normalized cutoff (fraction of Nyquist).
const MIN_NORM: f64 = 0.01;
const MAX_NORM: f64 = 0.99;
/// Minimum normalized band width kept after clamping.
const BAND_EPSILON: f64 = 0.01;

/// Band-pass parameters bound to a sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub sample_rate: f64,
    pub low_cutoff: f64,
    pub high_cutoff: f64,
    pub order: usize,
}

impl FilterSpec {
    pub fn new(sample_rate: f64, cfg: &FilterConfig) -> Self {
        Self {
            sample_rate,
            low_cutoff: cfg.low_cutoff_hz,
            high_cutoff: cfg.high_cutoff_hz,
            order: cfg.order,
        }
    }

    pub fn nyquist(&self) -> f64 {
        0.5 * self.sample_rate
    }

    /// Cutoffs normalized to Nyquist, clamped into the open unit interval.
    /// When clamping collapses the band, the high edge is pushed just above
    /// the low edge.
    pub fn normalized(&self) -> (f64, f64) {
        let nyq = self.nyquist();
        let low = (self.low_cutoff / nyq).clamp(MIN_NORM, MAX_NORM - BAND_EPSILON);
        let high = (self.high_cutoff / nyq).min(MAX_NORM).max(low + BAND_EPSILON);
        (low, high)
    }

    pub fn design(&self) -> SosFilter {
        let (low, high) = self.normalized();
        SosFilter::butter_bandpass(self.order, low, high)
    }
}

/// Subtract the least-squares line through `(t, y)`.
pub fn detrend(timestamps: &[f64], values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    if values.iter().all(|&v| v == values[0]) {
        return vec![0.0; n];
    }
    let n_f = n as f64;
    let mean_t = timestamps.iter().sum::<f64>() / n_f;
    let mean_y = values.iter().sum::<f64>() / n_f;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (&t, &y) in timestamps.iter().zip(values) {
        let dt = t - mean_t;
        sxx += dt * dt;
        sxy += dt * (y - mean_y);
    }
    let slope = if sxx > f64::EPSILON { sxy / sxx } else { 0.0 };
    timestamps
        .iter()
        .zip(values)
        .map(|(&t, &y)| y - (mean_y + slope * (t - mean_t)))
        .collect()
}

/// Zero-phase Butterworth band-pass.
pub fn bandpass(values: &[f64], spec: &FilterSpec) -> Vec<f64> {
    if values.iter().all(|&v| v == 0.0) {
        return values.to_vec();
    }
    spec.design().filtfilt(values)
}

/// Detrend then band-pass; output keeps the input's timestamps.
pub fn condition(trace: &SignalTrace, cfg: &FilterConfig) -> SignalTrace {
    let detrended = detrend(&trace.timestamps, &trace.values);
    let spec = FilterSpec::new(trace.fs, cfg);
    trace.with_values(bandpass(&detrended, &spec))
}
