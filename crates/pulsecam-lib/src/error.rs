use std::path::PathBuf;

/// Errors surfaced by the decoding layer, configuration loading and the
/// call-site range policies. The signal pipeline itself converts these into
/// absent or default results before they reach callers.
#[derive(Debug, thiserror::Error)]
pub enum PulsecamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },
    #[error("decoder binary `{tool}` could not be started: {source}")]
    MissingTool {
        tool: String,
        source: std::io::Error,
    },
    #[error("{0} has no video stream")]
    NoVideoStream(PathBuf),
    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
    #[error("finger not detected on camera (estimated {bpm:.1} BPM)")]
    FingerNotDetected { bpm: f64 },
    #[error("heart rate {bpm} BPM is outside the accepted {min}-{max} BPM range")]
    InvalidBpm { bpm: f64, min: f64, max: f64 },
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    #[error("classifier failed: {0}")]
    Classifier(String),
}

pub type Result<T> = std::result::Result<T, PulsecamError>;

impl PulsecamError {
    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.into(),
        }
    }
}
