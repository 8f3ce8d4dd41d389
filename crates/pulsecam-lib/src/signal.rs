use serde::{Deserialize, Serialize};

/// Per-frame measurement taken over the region of interest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    /// Seconds since the first frame (`frame_index / frame_rate`).
    pub timestamp: f64,
    /// Mean of the green channel.
    pub channel_mean: f64,
    /// Mean grayscale brightness.
    pub brightness_mean: f64,
}

/// Uniformly sampled trace with explicit timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTrace {
    /// Sampling frequency in Hz
    pub fs: f64,
    pub timestamps: Vec<f64>,
    pub values: Vec<f64>,
}

impl SignalTrace {
    /// Build a trace whose i-th sample sits at `i / fs`.
    pub fn from_uniform(fs: f64, values: Vec<f64>) -> Self {
        let timestamps = (0..values.len()).map(|i| i as f64 / fs).collect();
        Self {
            fs,
            timestamps,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn duration(&self) -> f64 {
        self.values.len() as f64 / self.fs
    }

    /// Same timestamps, new values (used after conditioning).
    pub fn with_values(&self, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), self.timestamps.len());
        Self {
            fs: self.fs,
            timestamps: self.timestamps.clone(),
            values,
        }
    }
}

/// The two parallel traces extracted from a video: green channel for rate
/// estimation, brightness for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameTraces {
    pub channel: SignalTrace,
    pub brightness: SignalTrace,
}

impl FrameTraces {
    pub fn from_frames(fs: f64, frames: &[FrameSample]) -> Self {
        let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();
        Self {
            channel: SignalTrace {
                fs,
                timestamps: timestamps.clone(),
                values: frames.iter().map(|f| f.channel_mean).collect(),
            },
            brightness: SignalTrace {
                fs,
                timestamps,
                values: frames.iter().map(|f| f.brightness_mean).collect(),
            },
        }
    }
}

/// Mono audio normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub sample_rate: u32,
    pub samples: Vec<f64>,
}

impl Waveform {
    pub fn rms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        (self.samples.iter().map(|s| s * s).sum::<f64>() / self.samples.len() as f64).sqrt()
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }
}

/// Point events on a timeline (detected beat indices)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Events {
    pub indices: Vec<usize>,
}

impl Events {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Inter-beat intervals (seconds)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatIntervals {
    pub intervals: Vec<f64>,
}

impl BeatIntervals {
    pub fn from_events(events: &Events, timestamps: &[f64]) -> Self {
        let intervals = events
            .indices
            .windows(2)
            .map(|w| timestamps[w[1]] - timestamps[w[0]])
            .collect();
        Self { intervals }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.intervals.is_empty() {
            return None;
        }
        Some(self.intervals.iter().sum::<f64>() / self.intervals.len() as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateMethod {
    Peak,
    Fft,
}

/// Output of one estimator. `value_bpm` is `None` when the method had no
/// confident answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateEstimate {
    pub value_bpm: Option<f64>,
    pub method: RateMethod,
}

impl RateEstimate {
    pub fn present(method: RateMethod, bpm: f64) -> Self {
        Self {
            value_bpm: Some(bpm),
            method,
        }
    }
    pub fn absent(method: RateMethod) -> Self {
        Self {
            value_bpm: None,
            method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Peak,
    Fft,
    Default,
}

impl From<RateMethod> for RateSource {
    fn from(method: RateMethod) -> Self {
        match method {
            RateMethod::Peak => RateSource::Peak,
            RateMethod::Fft => RateSource::Fft,
        }
    }
}

/// Reconciled heart rate; always a concrete value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalRateResult {
    pub bpm: f64,
    pub source: RateSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnoreResult {
    pub detected: bool,
    pub low_freq_ratio: f64,
    pub rms: f64,
}

impl SnoreResult {
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            low_freq_ratio: 0.0,
            rms: 0.0,
        }
    }
}

/// Result of one pipeline invocation over a video file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub bpm_peaks: Option<f64>,
    pub bpm_fft: Option<f64>,
    pub snore_detected: bool,
}

impl VideoAnalysis {
    pub fn no_signal() -> Self {
        Self {
            bpm_peaks: None,
            bpm_fft: None,
            snore_detected: false,
        }
    }
}
