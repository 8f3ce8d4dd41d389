use crate::metrics::spectrum::magnitude_spectrum;
use crate::signal::SignalTrace;
use serde::{Deserialize, Serialize};

/// Diagnostics of a conditioned trace. Not used for the rate decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceQuality {
    pub std_dev: f64,
    pub range: f64,
    /// Shannon entropy (bits) of the normalized power spectrum.
    pub spectral_entropy: f64,
}

pub fn evaluate_quality(trace: &SignalTrace) -> TraceQuality {
    TraceQuality {
        std_dev: compute_std_dev(&trace.values),
        range: compute_range(&trace.values),
        spectral_entropy: compute_spectral_entropy(trace),
    }
}

pub fn compute_std_dev(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = data.iter().sum::<f64>() / data.len() as f64;
    (data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64).sqrt()
}

pub fn compute_range(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max = data.iter().cloned().fold(f64::MIN, f64::max);
    let min = data.iter().cloned().fold(f64::MAX, f64::min);
    max - min
}

pub fn compute_spectral_entropy(trace: &SignalTrace) -> f64 {
    let spectrum = magnitude_spectrum(&trace.values, trace.fs);
    let total_power = spectrum.total_power();
    if total_power == 0.0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for m in &spectrum.magnitudes {
        let power = m * m;
        if power <= 0.0 {
            continue;
        }
        let p = power / total_power;
        entropy -= p * p.log2();
    }
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn flat_trace_is_all_zero() {
        let q = evaluate_quality(&SignalTrace::from_uniform(30.0, vec![2.0; 10]));
        assert_eq!(q.std_dev, 0.0);
        assert_eq!(q.range, 0.0);
        assert!(q.spectral_entropy.abs() < 1e-9);
    }

    #[test]
    fn pure_tone_has_lower_entropy_than_ramp() {
        let tone: Vec<f64> = (0..300)
            .map(|i| (2.0 * PI * 1.2 * i as f64 / 30.0).sin())
            .collect();
        let q = evaluate_quality(&SignalTrace::from_uniform(30.0, tone));
        assert!((q.std_dev - 0.5f64.sqrt()).abs() < 1e-3);
        assert!((q.range - 2.0).abs() < 0.01);

        let ramp: Vec<f64> = (0..300).map(|i| (i % 7) as f64).collect();
        let noisy = compute_spectral_entropy(&SignalTrace::from_uniform(30.0, ramp));
        assert!(q.spectral_entropy < noisy);
        assert!(q.spectral_entropy >= 0.0);
    }
}
