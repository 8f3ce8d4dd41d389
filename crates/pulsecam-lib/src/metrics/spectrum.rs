use crate::{
    config::SpectrumConfig,
    signal::{RateEstimate, RateMethod, SignalTrace},
};
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};

/// One-sided magnitude spectrum with its bin frequencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub magnitudes: Vec<f64>,
}

impl Spectrum {
    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// `(frequency, magnitude)` pairs with `low <= f <= high`.
    pub fn band(&self, low: f64, high: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.freqs
            .iter()
            .zip(&self.magnitudes)
            .filter(move |(f, _)| **f >= low && **f <= high)
            .map(|(f, m)| (*f, *m))
    }

    pub fn total_power(&self) -> f64 {
        self.magnitudes.iter().map(|m| m * m).sum()
    }

    /// Share of spectral power inside `[low, high]`. `None` when no bin falls
    /// in the band or the spectrum carries no power.
    pub fn band_power_ratio(&self, low: f64, high: f64) -> Option<f64> {
        let mut in_band = false;
        let mut band_power = 0.0;
        for (_, m) in self.band(low, high) {
            in_band = true;
            band_power += m * m;
        }
        let total = self.total_power();
        if !in_band || total <= 0.0 {
            return None;
        }
        Some(band_power / total)
    }
}

/// Real FFT of `data` sampled at `fs`; bins at `k * fs / n`.
pub fn magnitude_spectrum(data: &[f64], fs: f64) -> Spectrum {
    let n = data.len();
    if n == 0 {
        return Spectrum::default();
    }
    let mut planner = RealFftPlanner::<f64>::new();
    let r2c = planner.plan_fft_forward(n);
    let mut buffer = data.to_vec();
    let mut output = r2c.make_output_vec();
    if let Err(err) = r2c.process(&mut buffer, &mut output) {
        log::warn!("real FFT of {n} samples failed: {err}");
        return Spectrum::default();
    }
    Spectrum {
        freqs: (0..output.len()).map(|k| k as f64 * fs / n as f64).collect(),
        magnitudes: output.iter().map(|c| c.norm()).collect(),
    }
}

/// Dominant in-band frequency of the conditioned trace, in BPM.
pub fn estimate_fft_rate(trace: &SignalTrace, cfg: &SpectrumConfig) -> RateEstimate {
    let spectrum = magnitude_spectrum(&trace.values, trace.fs);
    let mut best: Option<(f64, f64)> = None;
    for (freq, mag) in spectrum.band(cfg.band_low_hz, cfg.band_high_hz) {
        if best.map_or(true, |(_, m)| mag > m) {
            best = Some((freq, mag));
        }
    }
    let estimate = match best {
        Some((freq, mag)) if mag > cfg.noise_floor => {
            RateEstimate::present(RateMethod::Fft, freq * 60.0)
        }
        _ => RateEstimate::absent(RateMethod::Fft),
    };
    log::debug!("FFT estimator: {:?} BPM", estimate.value_bpm);
    estimate
}
