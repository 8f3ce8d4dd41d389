use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration. Every section is optional in TOML and falls back
/// to the defaults below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulsecamConfig {
    pub video: VideoConfig,
    pub filter: FilterConfig,
    pub peaks: PeakConfig,
    pub spectrum: SpectrumConfig,
    pub snore: SnoreConfig,
    pub reconcile: ReconcileConfig,
    pub heart_rate_check: HeartRateCheckConfig,
    pub fingertip_check: FingertipCheckConfig,
    pub snore_check: SnoreCheckConfig,
    /// Directory for temporary decoded audio. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl PulsecamConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Frame rate used when the container reports none (or zero).
    pub fallback_fps: f64,
    /// Half-width of the centered square region of interest, in pixels.
    pub crop_half_width: u32,
    /// Both frame dimensions must exceed this for the crop to apply.
    pub min_crop_dimension: u32,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            fallback_fps: 30.0,
            crop_half_width: 50,
            min_crop_dimension: 100,
            ffmpeg_bin: "ffmpeg".into(),
            ffprobe_bin: "ffprobe".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_cutoff_hz: f64,
    pub high_cutoff_hz: f64,
    pub order: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_cutoff_hz: 0.5,
            high_cutoff_hz: 5.0,
            order: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    /// Moving-average window applied to the rectified envelope (seconds).
    pub smoothing_window_s: f64,
    /// Minimum distance between accepted peaks (seconds); 0.4 s caps the
    /// instantaneous rate at 150 BPM.
    pub min_separation_s: f64,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self {
            smoothing_window_s: 0.2,
            min_separation_s: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    /// Band magnitudes at or below this are treated as numerical noise.
    pub noise_floor: f64,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 0.5,
            band_high_hz: 5.0,
            noise_floor: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoreConfig {
    pub band_low_hz: f64,
    pub band_high_hz: f64,
    /// RMS on the [-1, 1] scale below which a recording counts as silent.
    pub silence_rms: f64,
    /// Low-band share of spectral power above which snoring is reported.
    pub ratio_threshold: f64,
}

impl Default for SnoreConfig {
    fn default() -> Self {
        Self {
            band_low_hz: 20.0,
            band_high_hz: 300.0,
            silence_rms: 0.01,
            ratio_threshold: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub default_bpm: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { default_bpm: 70.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartRateCheckConfig {
    pub duration_s: Option<f64>,
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub fallback_bpm: f64,
}

impl Default for HeartRateCheckConfig {
    fn default() -> Self {
        Self {
            duration_s: Some(20.0),
            min_bpm: 40.0,
            max_bpm: 180.0,
            fallback_bpm: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingertipCheckConfig {
    pub duration_s: Option<f64>,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for FingertipCheckConfig {
    fn default() -> Self {
        Self {
            duration_s: None,
            min_bpm: 50.0,
            max_bpm: 150.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnoreCheckConfig {
    pub duration_s: Option<f64>,
}

impl Default for SnoreCheckConfig {
    fn default() -> Self {
        Self {
            duration_s: Some(10.0),
        }
    }
}
