use crate::{
    config::SnoreConfig,
    metrics::spectrum::magnitude_spectrum,
    signal::{SnoreResult, Waveform},
};

/// Spectral snore classifier: a recording counts as snoring when it is not
/// silent and more than `ratio_threshold` of its spectral power lies in the
/// snoring band.
pub fn classify_snore(wave: &Waveform, cfg: &SnoreConfig) -> SnoreResult {
    if wave.samples.is_empty() {
        log::debug!("snore: empty waveform");
        return SnoreResult::not_detected();
    }
    let rms = wave.rms();
    log::debug!(
        "snore: {} samples at {} Hz, RMS {:.4}",
        wave.samples.len(),
        wave.sample_rate,
        rms
    );
    if rms < cfg.silence_rms {
        log::debug!("snore: too quiet");
        return SnoreResult {
            detected: false,
            low_freq_ratio: 0.0,
            rms,
        };
    }
    let spectrum = magnitude_spectrum(&wave.samples, wave.sample_rate as f64);
    let Some(ratio) = spectrum.band_power_ratio(cfg.band_low_hz, cfg.band_high_hz) else {
        log::debug!("snore: no power in the snoring band");
        return SnoreResult {
            detected: false,
            low_freq_ratio: 0.0,
            rms,
        };
    };
    let detected = ratio > cfg.ratio_threshold;
    log::debug!("snore: low-frequency ratio {ratio:.4}, detected {detected}");
    SnoreResult {
        detected,
        low_freq_ratio: ratio,
        rms,
    }
}
