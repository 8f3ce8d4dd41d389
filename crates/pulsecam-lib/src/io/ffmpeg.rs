use crate::error::{PulsecamError, Result};
use serde::Deserialize;
use std::{
    io,
    path::Path,
    process::{Child, Command, Stdio},
};

/// Subset of `ffprobe -of json` stream metadata the decoders need.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeReport {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProbeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub avg_frame_rate: Option<String>,
    pub r_frame_rate: Option<String>,
}

impl ProbeReport {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| PulsecamError::UnsupportedInput(format!("ffprobe output: {err}")))
    }

    pub fn first_of(&self, codec_type: &str) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(codec_type))
    }
}

impl ProbeStream {
    /// Average frame rate when usable, else the container's base rate.
    pub fn frame_rate(&self) -> Option<f64> {
        self.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| self.r_frame_rate.as_deref().and_then(parse_frame_rate))
    }
}

/// Parse ffprobe rationals such as `30000/1001`; zero and `0/0` yield `None`.
pub fn parse_frame_rate(text: &str) -> Option<f64> {
    let text = text.trim();
    let rate = match text.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => text.parse().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Run ffprobe on `path` and parse its stream table.
pub fn probe(ffprobe_bin: &str, path: &Path) -> Result<ProbeReport> {
    ensure_readable(path)?;
    let output = Command::new(ffprobe_bin)
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=codec_type,width,height,avg_frame_rate,r_frame_rate",
            "-of",
            "json",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|err| spawn_error(ffprobe_bin, err))?;
    if !output.status.success() {
        return Err(PulsecamError::decode(
            path,
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    ProbeReport::parse(&String::from_utf8_lossy(&output.stdout))
}

pub(crate) fn ensure_readable(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PulsecamError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a readable file", path.display()),
        )))
    }
}

pub(crate) fn spawn_error(bin: &str, err: io::Error) -> PulsecamError {
    if err.kind() == io::ErrorKind::NotFound {
        PulsecamError::MissingTool {
            tool: bin.to_string(),
            source: err,
        }
    } else {
        PulsecamError::Io(err)
    }
}

/// Owns a decoder child; kills and reaps it when dropped.
#[derive(Debug)]
pub struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    pub fn new(child: Child) -> Self {
        Self { child }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        // Already exited is fine; kill only fails then.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
