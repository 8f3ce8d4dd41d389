use crate::{
    config::PulsecamConfig,
    error::{PulsecamError, Result},
    io::ffmpeg::{probe, spawn_error},
    signal::Waveform,
};
use hound::SampleFormat;
use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};
use tempfile::NamedTempFile;

/// File-name prefix of the transcoded audio held for the length of one call.
pub const AUDIO_TEMP_PREFIX: &str = "pulsecam-audio-";

/// Capability for pulling the audio track out of a recording.
pub trait AudioSource {
    /// Mono waveform of the first audio stream; `Ok(None)` when the file has
    /// no audio stream.
    fn load_audio(&self, path: &Path) -> Result<Option<Waveform>>;
}

/// Transcodes the first audio stream to a temporary 16-bit PCM WAV with
/// `ffmpeg`, then reads it back with `hound`.
#[derive(Debug, Clone)]
pub struct FfmpegAudioSource {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub temp_dir: Option<PathBuf>,
}

impl FfmpegAudioSource {
    pub fn from_config(cfg: &PulsecamConfig) -> Self {
        Self {
            ffmpeg_bin: cfg.video.ffmpeg_bin.clone(),
            ffprobe_bin: cfg.video.ffprobe_bin.clone(),
            temp_dir: cfg.temp_dir.clone(),
        }
    }
}

impl Default for FfmpegAudioSource {
    fn default() -> Self {
        Self::from_config(&PulsecamConfig::default())
    }
}

impl AudioSource for FfmpegAudioSource {
    fn load_audio(&self, path: &Path) -> Result<Option<Waveform>> {
        let report = probe(&self.ffprobe_bin, path)?;
        if report.first_of("audio").is_none() {
            log::debug!("{} has no audio stream", path.display());
            return Ok(None);
        }
        // Removed on drop, whichever way this function returns.
        let wav = temp_wav(self.temp_dir.as_deref())?;
        let output = Command::new(&self.ffmpeg_bin)
            .args(["-v", "error", "-nostdin", "-y", "-i"])
            .arg(path)
            .args(["-map", "0:a:0", "-vn", "-acodec", "pcm_s16le", "-f", "wav"])
            .arg(wav.path())
            .stdin(Stdio::null())
            .output()
            .map_err(|err| spawn_error(&self.ffmpeg_bin, err))?;
        if !output.status.success() {
            return Err(PulsecamError::decode(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let wave = read_wav(wav.path())?;
        log::debug!(
            "audio: {} samples at {} Hz ({:.2} s)",
            wave.samples.len(),
            wave.sample_rate,
            wave.duration()
        );
        Ok(Some(wave))
    }
}

/// Uniquely named `.wav` temp file in `dir` (system temp dir when `None`).
pub fn temp_wav(dir: Option<&Path>) -> Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(AUDIO_TEMP_PREFIX).suffix(".wav");
    let file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };
    Ok(file)
}

/// Read a WAV file as mono samples in [-1, 1]; channels are averaged.
pub fn read_wav(path: &Path) -> Result<Waveform> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = (1i64 << spec.bits_per_sample.saturating_sub(1).min(31)).max(1) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };
    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f64>() / channels as f64)
            .collect()
    };
    Ok(Waveform {
        sample_rate: spec.sample_rate,
        samples,
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};
    use tempfile::tempdir;

    fn write_i16(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for s in samples {
            writer.write_sample(*s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(AUDIO_TEMP_PREFIX))
            .count()
    }

    #[test]
    fn int_samples_are_normalized_and_downmixed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_i16(&path, 2, &[16384, 16384, 16384, -16384, -32768, -32768]);
        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.sample_rate, 8000);
        assert_eq!(wave.samples, vec![0.5, 0.0, -1.0]);
    }

    #[test]
    fn float_samples_pass_through() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for s in [0.25f32, -0.5, 1.0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.samples, vec![0.25, -0.5, 1.0]);
        assert!((wave.duration() - 3.0 / 44_100.0).abs() < 1e-12);
    }

    #[test]
    fn garbage_is_a_wav_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"definitely not RIFF").unwrap();
        assert!(matches!(read_wav(&path), Err(PulsecamError::Wav(_))));
    }

    #[test]
    fn temp_files_are_unique_and_removed_on_drop() {
        let dir = tempdir().unwrap();
        let a = temp_wav(Some(dir.path())).unwrap();
        let b = temp_wav(Some(dir.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert_eq!(a.path().extension().unwrap(), "wav");
        assert_eq!(leftover_temp_files(dir.path()), 2);
        drop(a);
        drop(b);
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[cfg(unix)]
    mod with_fake_tools {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> String {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn source(tools: &Path, temp: &Path, probe_json: &str, ffmpeg_body: &str) -> FfmpegAudioSource {
            FfmpegAudioSource {
                ffprobe_bin: script(tools, "ffprobe", &format!("echo '{probe_json}'")),
                ffmpeg_bin: script(tools, "ffmpeg", ffmpeg_body),
                temp_dir: Some(temp.to_path_buf()),
            }
        }

        #[test]
        fn transcoded_audio_is_read_and_cleaned_up() {
            let tools = tempdir().unwrap();
            let temp = tempdir().unwrap();
            let fixture = tools.path().join("fixture.wav");
            write_i16(&fixture, 1, &[0, 16384, -16384, 0]);
            let input = tools.path().join("clip.mp4");
            std::fs::write(&input, b"container").unwrap();
            let src = source(
                tools.path(),
                temp.path(),
                r#"{"streams":[{"codec_type":"audio"}]}"#,
                &format!("for last; do :; done\ncp '{}' \"$last\"", fixture.display()),
            );
            let wave = src.load_audio(&input).unwrap().unwrap();
            assert_eq!(wave.samples, vec![0.0, 0.5, -0.5, 0.0]);
            assert_eq!(leftover_temp_files(temp.path()), 0);
        }

        #[test]
        fn failed_transcode_leaves_no_temp_file() {
            let tools = tempdir().unwrap();
            let temp = tempdir().unwrap();
            let input = tools.path().join("clip.mp4");
            std::fs::write(&input, b"container").unwrap();
            let src = source(
                tools.path(),
                temp.path(),
                r#"{"streams":[{"codec_type":"audio"}]}"#,
                "echo broken >&2\nexit 1",
            );
            let err = src.load_audio(&input).unwrap_err();
            assert!(err.to_string().contains("broken"));
            assert_eq!(leftover_temp_files(temp.path()), 0);
        }

        #[test]
        fn video_without_audio_stream_is_none() {
            let tools = tempdir().unwrap();
            let temp = tempdir().unwrap();
            let input = tools.path().join("clip.mp4");
            std::fs::write(&input, b"container").unwrap();
            let src = source(
                tools.path(),
                temp.path(),
                r#"{"streams":[{"codec_type":"video","width":8,"height":8}]}"#,
                "exit 1",
            );
            assert!(src.load_audio(&input).unwrap().is_none());
        }
    }

    #[test]
    fn missing_ffprobe_is_reported() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"container").unwrap();
        let src = FfmpegAudioSource {
            ffmpeg_bin: "pulsecam-no-such-ffmpeg".into(),
            ffprobe_bin: "pulsecam-no-such-ffprobe".into(),
            temp_dir: Some(dir.path().to_path_buf()),
        };
        let err = src.load_audio(&input).unwrap_err();
        assert!(matches!(err, PulsecamError::MissingTool { .. }));
    }
}
