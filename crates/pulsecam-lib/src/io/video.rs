use crate::{
    config::VideoConfig,
    error::{PulsecamError, Result},
    io::ffmpeg::{probe, spawn_error, ChildGuard},
    signal::FrameSample,
};
use std::{
    io::{self, Read},
    path::Path,
    process::{ChildStdout, Command, Stdio},
};

/// One decoded frame as packed 8-bit RGB, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl VideoFrame {
    /// Solid-color frame.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgb: rgb.iter().copied().cycle().take(pixels * 3).collect(),
        }
    }

    fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let at = (y * self.width as usize + x) * 3;
        [self.rgb[at], self.rgb[at + 1], self.rgb[at + 2]]
    }
}

/// Capability for opening a video as a sequence of frames.
pub trait FrameSource {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>>;
}

pub trait FrameStream {
    /// Frame rate reported by the container, if any.
    fn frame_rate(&self) -> Option<f64>;
    /// Next frame; `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;
}

/// Decodes through `ffprobe` (metadata) and `ffmpeg` (raw rgb24 frames on a
/// pipe).
#[derive(Debug, Clone)]
pub struct FfmpegFrameSource {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl FfmpegFrameSource {
    pub fn from_config(cfg: &VideoConfig) -> Self {
        Self {
            ffmpeg_bin: cfg.ffmpeg_bin.clone(),
            ffprobe_bin: cfg.ffprobe_bin.clone(),
        }
    }
}

impl Default for FfmpegFrameSource {
    fn default() -> Self {
        Self::from_config(&VideoConfig::default())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameStream>> {
        let report = probe(&self.ffprobe_bin, path)?;
        let stream = report
            .first_of("video")
            .ok_or_else(|| PulsecamError::NoVideoStream(path.to_path_buf()))?;
        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(PulsecamError::decode(path, "video stream has no frame size")),
        };
        let frame_rate = stream.frame_rate();
        let mut child = Command::new(&self.ffmpeg_bin)
            // Rotation metadata would swap the probed width and height.
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| spawn_error(&self.ffmpeg_bin, err))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PulsecamError::decode(path, "ffmpeg stdout unavailable"))?;
        log::debug!(
            "decoding {} ({width}x{height}, reported {:?} fps)",
            path.display(),
            frame_rate
        );
        Ok(Box::new(FfmpegFrameStream {
            stdout,
            _guard: ChildGuard::new(child),
            width,
            height,
            frame_rate,
        }))
    }
}

struct FfmpegFrameStream {
    stdout: ChildStdout,
    // Dropped after `stdout`, so the pipe closes before the kill.
    _guard: ChildGuard,
    width: u32,
    height: u32,
    frame_rate: Option<f64>,
}

impl FrameStream for FfmpegFrameStream {
    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let mut rgb = vec![0u8; self.width as usize * self.height as usize * 3];
        match self.stdout.read_exact(&mut rgb) {
            Ok(()) => Ok(Some(VideoFrame {
                width: self.width,
                height: self.height,
                rgb,
            })),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Frames measured from one video, plus the frame rate used for timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFrames {
    pub fps: f64,
    pub samples: Vec<FrameSample>,
}

/// Mean green channel and mean grayscale brightness over the region of
/// interest: a centered square of half-width `crop_half_width` when both
/// dimensions exceed `min_crop_dimension`, else the whole frame.
pub fn measure_frame(frame: &VideoFrame, cfg: &VideoConfig) -> (f64, f64) {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let (x0, x1, y0, y1) = if frame.width > cfg.min_crop_dimension
        && frame.height > cfg.min_crop_dimension
    {
        let half = cfg.crop_half_width as usize;
        let (cx, cy) = (w / 2, h / 2);
        (
            cx.saturating_sub(half),
            (cx + half).min(w),
            cy.saturating_sub(half),
            (cy + half).min(h),
        )
    } else {
        (0, w, 0, h)
    };
    let count = (x1 - x0) * (y1 - y0);
    if count == 0 || frame.rgb.len() < w * h * 3 {
        return (0.0, 0.0);
    }
    let mut green = 0.0;
    let mut gray = 0.0;
    for y in y0..y1 {
        for x in x0..x1 {
            let [r, g, b] = frame.pixel(x, y);
            green += g as f64;
            gray += 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        }
    }
    (green / count as f64, gray / count as f64)
}

/// Decode and measure frames until the stream ends or `duration_limit`
/// seconds have been recorded. A decode failure after the first frame ends
/// the trace early rather than discarding it.
pub fn extract_frames(
    source: &dyn FrameSource,
    path: &Path,
    duration_limit: Option<f64>,
    cfg: &VideoConfig,
) -> Result<ExtractedFrames> {
    let mut stream = source.open(path)?;
    let fps = stream.frame_rate().unwrap_or(cfg.fallback_fps);
    let limit = duration_limit.filter(|d| *d > 0.0);
    let mut samples = Vec::new();
    loop {
        let frame = match stream.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) if !samples.is_empty() => {
                log::warn!("decoding stopped after {} frames: {err}", samples.len());
                break;
            }
            Err(err) => return Err(err),
        };
        let index = samples.len();
        let (channel_mean, brightness_mean) = measure_frame(&frame, cfg);
        samples.push(FrameSample {
            timestamp: index as f64 / fps,
            channel_mean,
            brightness_mean,
        });
        if limit.is_some_and(|d| (index + 1) as f64 / fps >= d) {
            break;
        }
    }
    log::debug!("extracted {} frames at {fps} fps", samples.len());
    Ok(ExtractedFrames { fps, samples })
}
