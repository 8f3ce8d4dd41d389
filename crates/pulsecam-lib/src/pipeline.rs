//! End-to-end flows: one video in, heart-rate estimates and a snore flag out.
//!
//! Every failure below this layer (missing decoder, unreadable file, empty
//! stream) degrades to absent estimates or the default rate. Only the
//! fingertip check turns an implausible rate into an error.

use crate::{
    conditioning::condition,
    config::PulsecamConfig,
    detectors::{peaks::run_peak_pipeline, snore::classify_snore, PeakDetection},
    error::Result,
    io::{
        audio::{read_wav, AudioSource, FfmpegAudioSource},
        video::{extract_frames, FfmpegFrameSource, FrameSource},
    },
    metrics::{quality::evaluate_quality, spectrum::estimate_fft_rate, TraceQuality},
    reconcile::{reconcile, HeartRateReading, RangePolicy},
    signal::{
        FinalRateResult, FrameSample, FrameTraces, RateEstimate, RateMethod, SignalTrace,
        SnoreResult, VideoAnalysis,
    },
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Decoders used by one call.
#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub frames: &'a dyn FrameSource,
    pub audio: &'a dyn AudioSource,
}

/// The ffmpeg-backed decoders built from configuration.
#[derive(Debug, Clone)]
pub struct DefaultSources {
    pub frames: FfmpegFrameSource,
    pub audio: FfmpegAudioSource,
}

impl DefaultSources {
    pub fn from_config(cfg: &PulsecamConfig) -> Self {
        Self {
            frames: FfmpegFrameSource::from_config(&cfg.video),
            audio: FfmpegAudioSource::from_config(cfg),
        }
    }

    pub fn sources(&self) -> Sources<'_> {
        Sources {
            frames: &self.frames,
            audio: &self.audio,
        }
    }
}

/// DSP results for one trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceAnalysis {
    pub conditioned: SignalTrace,
    pub quality: TraceQuality,
    pub peaks: PeakDetection,
    pub fft: RateEstimate,
    pub rate: FinalRateResult,
}

/// Condition a raw trace, run both estimators and reconcile them.
pub fn analyze_trace(trace: &SignalTrace, cfg: &PulsecamConfig) -> TraceAnalysis {
    let conditioned = condition(trace, &cfg.filter);
    let quality = evaluate_quality(&conditioned);
    log::debug!(
        "filtered trace: {} samples at {} fps, std {:.4}, range {:.4}",
        conditioned.len(),
        conditioned.fs,
        quality.std_dev,
        quality.range
    );
    let peaks = run_peak_pipeline(&conditioned, &cfg.peaks);
    let fft = estimate_fft_rate(&conditioned, &cfg.spectrum);
    let rate = reconcile(peaks.estimate, fft, &cfg.reconcile);
    TraceAnalysis {
        conditioned,
        quality,
        peaks,
        fft,
        rate,
    }
}

/// Everything one video call produced, for diagnostics and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedAnalysis {
    pub analysis: VideoAnalysis,
    pub fps: Option<f64>,
    pub frames: Vec<FrameSample>,
    pub brightness_quality: Option<TraceQuality>,
    pub trace: Option<TraceAnalysis>,
    pub snore: SnoreResult,
}

impl DetailedAnalysis {
    fn no_signal() -> Self {
        Self {
            analysis: VideoAnalysis::no_signal(),
            fps: None,
            frames: Vec::new(),
            brightness_quality: None,
            trace: None,
            snore: SnoreResult::not_detected(),
        }
    }

    /// Reconciled rate; the configured default when no frames were decoded.
    pub fn rate(&self, cfg: &PulsecamConfig) -> FinalRateResult {
        estimates_rate(&self.analysis, cfg)
    }
}

pub fn analyze_video_detailed(
    path: &Path,
    duration_limit: Option<f64>,
    sources: Sources<'_>,
    cfg: &PulsecamConfig,
) -> DetailedAnalysis {
    let extracted = match extract_frames(sources.frames, path, duration_limit, &cfg.video) {
        Ok(extracted) if !extracted.samples.is_empty() => extracted,
        Ok(_) => {
            log::warn!("{}: no frames decoded", path.display());
            return DetailedAnalysis::no_signal();
        }
        Err(err) => {
            log::warn!("{}: {err}", path.display());
            return DetailedAnalysis::no_signal();
        }
    };
    log::debug!(
        "number of frames: {}, fps: {}",
        extracted.samples.len(),
        extracted.fps
    );
    let traces = FrameTraces::from_frames(extracted.fps, &extracted.samples);
    let brightness_quality = evaluate_quality(&traces.brightness);
    let trace = analyze_trace(&traces.channel, cfg);
    let snore = detect_snore(sources.audio, path, cfg);
    DetailedAnalysis {
        analysis: VideoAnalysis {
            bpm_peaks: trace.peaks.estimate.value_bpm,
            bpm_fft: trace.fft.value_bpm,
            snore_detected: snore.detected,
        },
        fps: Some(extracted.fps),
        frames: extracted.samples,
        brightness_quality: Some(brightness_quality),
        trace: Some(trace),
        snore,
    }
}

/// Heart-rate estimates and snore flag for one video. Never fails.
pub fn analyze_video(
    path: &Path,
    duration_limit: Option<f64>,
    sources: Sources<'_>,
    cfg: &PulsecamConfig,
) -> VideoAnalysis {
    analyze_video_detailed(path, duration_limit, sources, cfg).analysis
}

/// Snore classification of the recording's audio track; decode failures and
/// missing audio count as "not detected".
pub fn detect_snore(audio: &dyn AudioSource, path: &Path, cfg: &PulsecamConfig) -> SnoreResult {
    match audio.load_audio(path) {
        Ok(Some(wave)) => classify_snore(&wave, &cfg.snore),
        Ok(None) => SnoreResult::not_detected(),
        Err(err) => {
            log::warn!("snore detection skipped for {}: {err}", path.display());
            SnoreResult::not_detected()
        }
    }
}

/// Snore classification of a WAV file on disk.
pub fn snore_from_wav(path: &Path, cfg: &PulsecamConfig) -> Result<SnoreResult> {
    let wave = read_wav(path)?;
    Ok(classify_snore(&wave, &cfg.snore))
}

fn estimates_rate(analysis: &VideoAnalysis, cfg: &PulsecamConfig) -> FinalRateResult {
    let peak = RateEstimate {
        value_bpm: analysis.bpm_peaks,
        method: RateMethod::Peak,
    };
    let fft = RateEstimate {
        value_bpm: analysis.bpm_fft,
        method: RateMethod::Fft,
    };
    reconcile(peak, fft, &cfg.reconcile)
}

/// Heart-rate screening step: capped recording, out-of-range rates replaced by
/// the fallback.
pub fn heart_rate_check(path: &Path, sources: Sources<'_>, cfg: &PulsecamConfig) -> HeartRateReading {
    let check = &cfg.heart_rate_check;
    let analysis = analyze_video(path, check.duration_s, sources, cfg);
    let rate = estimates_rate(&analysis, cfg);
    RangePolicy::from(check)
        .apply(rate)
        .unwrap_or(HeartRateReading {
            bpm: check.fallback_bpm,
            source: rate.source,
            substituted: true,
        })
}

/// Fingertip-on-lens check: an implausible rate means the finger was not
/// covering the camera.
pub fn fingertip_check(
    path: &Path,
    sources: Sources<'_>,
    cfg: &PulsecamConfig,
) -> Result<HeartRateReading> {
    let check = &cfg.fingertip_check;
    let analysis = analyze_video(path, check.duration_s, sources, cfg);
    RangePolicy::from(check).apply(estimates_rate(&analysis, cfg))
}

/// Snore screening step. `manual_snore` is the user's own report and forces
/// a positive result.
pub fn snore_check(
    path: &Path,
    manual_snore: bool,
    sources: Sources<'_>,
    cfg: &PulsecamConfig,
) -> SnoreResult {
    let detailed = analyze_video_detailed(path, cfg.snore_check.duration_s, sources, cfg);
    if manual_snore {
        SnoreResult {
            detected: true,
            ..detailed.snore
        }
    } else {
        detailed.snore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::PulsecamError,
        io::{
            audio::testing::{BrokenAudio, SyntheticAudio},
            video::testing::{SyntheticFrames, Unreadable},
        },
        signal::{RateSource, Waveform},
    };
    use std::f64::consts::PI;

    const CLIP: &str = "clip.mp4";

    fn pulse_frames(freq: f64, seconds: f64, phase: f64) -> SyntheticFrames {
        let n = (30.0 * seconds).round() as usize;
        let green: Vec<f64> = (0..n)
            .map(|i| 100.0 + 20.0 * (2.0 * PI * freq * i as f64 / 30.0 + phase).sin())
            .collect();
        SyntheticFrames::from_green(Some(30.0), &green)
    }

    fn snoring() -> Waveform {
        let samples = (0..8000)
            .map(|i| {
                let t = i as f64 / 8000.0;
                0.4 * (2.0 * PI * 120.0 * t).sin() + 0.05 * (2.0 * PI * 2500.0 * t).sin()
            })
            .collect();
        Waveform {
            sample_rate: 8000,
            samples,
        }
    }

    fn run(frames: &dyn FrameSource, audio: &dyn AudioSource) -> VideoAnalysis {
        analyze_video(
            Path::new(CLIP),
            None,
            Sources { frames, audio },
            &PulsecamConfig::default(),
        )
    }

    #[test]
    fn pulse_video_yields_both_estimates_and_snore() {
        let frames = pulse_frames(1.2, 10.0, 0.0);
        let audio = SyntheticAudio::new(Some(snoring()));
        let analysis = run(&frames, &audio);
        assert_eq!(analysis.bpm_fft, Some(72.0));
        let peaks = analysis.bpm_peaks.unwrap();
        assert!((peaks - 72.0).abs() <= 0.05 * 72.0, "peaks {peaks}");
        assert!(analysis.snore_detected);
        assert_eq!(audio.calls.get(), 1);
    }

    #[test]
    fn repeated_runs_are_identical() {
        let frames = pulse_frames(1.5, 8.0, 0.3);
        let audio = SyntheticAudio::new(Some(snoring()));
        let first = run(&frames, &audio);
        let second = run(&frames, &audio);
        assert_eq!(first, second);
        assert_eq!(
            first.bpm_fft.map(f64::to_bits),
            second.bpm_fft.map(f64::to_bits)
        );
        assert_eq!(
            first.bpm_peaks.map(f64::to_bits),
            second.bpm_peaks.map(f64::to_bits)
        );
    }

    #[test]
    fn unreadable_video_short_circuits() {
        let audio = SyntheticAudio::new(Some(snoring()));
        assert_eq!(run(&Unreadable, &audio), VideoAnalysis::no_signal());
        let empty = SyntheticFrames::default();
        assert_eq!(run(&empty, &audio), VideoAnalysis::no_signal());
        assert_eq!(audio.calls.get(), 0);

        let cfg = PulsecamConfig::default();
        let sources = Sources {
            frames: &Unreadable,
            audio: &audio,
        };
        let reading = heart_rate_check(Path::new(CLIP), sources, &cfg);
        assert_eq!(reading.bpm, 70.0);
        assert_eq!(reading.source, RateSource::Default);
        assert!(!reading.substituted);
        assert_eq!(fingertip_check(Path::new(CLIP), sources, &cfg).unwrap().bpm, 70.0);
    }

    #[test]
    fn real_decoders_degrade_on_missing_file() {
        let cfg = PulsecamConfig::default();
        let decoders = DefaultSources::from_config(&cfg);
        let analysis = analyze_video(
            Path::new("/no/such/recording.mp4"),
            Some(20.0),
            decoders.sources(),
            &cfg,
        );
        assert_eq!(analysis, VideoAnalysis::no_signal());
    }

    #[test]
    fn constant_video_falls_back_to_default_rate() {
        let frames = SyntheticFrames::from_green(Some(30.0), &[120.0; 300]);
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        let detailed = analyze_video_detailed(
            Path::new(CLIP),
            None,
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &cfg,
        );
        assert_eq!(detailed.analysis.bpm_peaks, None);
        assert_eq!(detailed.analysis.bpm_fft, None);
        assert!(!detailed.analysis.snore_detected);
        let rate = detailed.rate(&cfg);
        assert_eq!(rate.bpm, 70.0);
        assert_eq!(rate.source, RateSource::Default);
        assert!(detailed
            .trace
            .unwrap()
            .conditioned
            .values
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn one_second_clip_reconciles_to_sixty() {
        // 30 frames cannot hold two systolic peaks one period apart, so the
        // spectral estimate carries the result.
        let frames = pulse_frames(1.0, 1.0, 0.0);
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        let detailed = analyze_video_detailed(
            Path::new(CLIP),
            None,
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &cfg,
        );
        assert_eq!(detailed.frames.len(), 30);
        assert_eq!(detailed.analysis.bpm_fft, Some(60.0));
        let rate = detailed.rate(&cfg);
        assert_eq!(rate.bpm, 60.0);
        assert_eq!(rate.source, RateSource::Fft);
        let trace = detailed.trace.unwrap();
        assert_eq!(trace.peaks.events.len(), 1);
        assert!(detailed.analysis.bpm_peaks.is_none());
    }

    #[test]
    fn two_second_clip_has_two_peaks_near_sixty() {
        let frames = pulse_frames(1.0, 2.0, 0.0);
        let audio = SyntheticAudio::new(None);
        let detailed = analyze_video_detailed(
            Path::new(CLIP),
            None,
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &PulsecamConfig::default(),
        );
        let trace = detailed.trace.unwrap();
        assert!(trace.peaks.events.len() >= 2);
        let bpm = detailed.analysis.bpm_peaks.unwrap();
        assert!((bpm - 60.0).abs() <= 3.0, "peaks {bpm}");
        assert_eq!(detailed.analysis.bpm_fft, Some(60.0));
    }

    #[test]
    fn heart_rate_check_substitutes_implausible_rates() {
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        let fast = pulse_frames(3.5, 10.0, 0.0);
        let reading = heart_rate_check(
            Path::new(CLIP),
            Sources {
                frames: &fast,
                audio: &audio,
            },
            &cfg,
        );
        assert_eq!(reading.bpm, 70.0);
        assert!(reading.substituted);
        assert_eq!(reading.source, RateSource::Fft);

        let normal = pulse_frames(1.2, 10.0, 0.0);
        let reading = heart_rate_check(
            Path::new(CLIP),
            Sources {
                frames: &normal,
                audio: &audio,
            },
            &cfg,
        );
        assert_eq!(reading.bpm, 72.0);
        assert!(!reading.substituted);
    }

    #[test]
    fn heart_rate_check_caps_duration() {
        let frames = pulse_frames(1.2, 30.0, 0.0);
        let audio = SyntheticAudio::new(None);
        let detailed = analyze_video_detailed(
            Path::new(CLIP),
            PulsecamConfig::default().heart_rate_check.duration_s,
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &PulsecamConfig::default(),
        );
        assert_eq!(detailed.frames.len(), 600);
    }

    #[test]
    fn fingertip_check_reads_the_whole_clip() {
        let frames = pulse_frames(1.2, 30.0, 0.0);
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        let sources = Sources {
            frames: &frames,
            audio: &audio,
        };
        let detailed =
            analyze_video_detailed(Path::new(CLIP), cfg.fingertip_check.duration_s, sources, &cfg);
        assert_eq!(detailed.frames.len(), 900);
        assert_eq!(fingertip_check(Path::new(CLIP), sources, &cfg).unwrap().bpm, 72.0);
    }

    #[test]
    fn fingertip_check_aborts_outside_range() {
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        for freq in [2.8, 0.6] {
            let frames = pulse_frames(freq, 10.0, 0.0);
            let err = fingertip_check(
                Path::new(CLIP),
                Sources {
                    frames: &frames,
                    audio: &audio,
                },
                &cfg,
            )
            .unwrap_err();
            assert!(matches!(err, PulsecamError::FingerNotDetected { .. }), "{freq} Hz");
        }
        let frames = pulse_frames(1.2, 10.0, 0.0);
        let ok = fingertip_check(
            Path::new(CLIP),
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &cfg,
        )
        .unwrap();
        assert_eq!(ok.bpm, 72.0);
    }

    #[test]
    fn snore_check_honours_manual_report_and_audio_failures() {
        let frames = pulse_frames(1.2, 12.0, 0.0);
        let cfg = PulsecamConfig::default();
        let quiet = SyntheticAudio::new(None);
        let sources = Sources {
            frames: &frames,
            audio: &quiet,
        };
        assert!(!snore_check(Path::new(CLIP), false, sources, &cfg).detected);
        assert!(snore_check(Path::new(CLIP), true, sources, &cfg).detected);

        let broken = Sources {
            frames: &frames,
            audio: &BrokenAudio,
        };
        assert!(!snore_check(Path::new(CLIP), false, broken, &cfg).detected);

        let loud = SyntheticAudio::new(Some(snoring()));
        let result = snore_check(
            Path::new(CLIP),
            false,
            Sources {
                frames: &frames,
                audio: &loud,
            },
            &cfg,
        );
        assert!(result.detected);
        assert!(result.low_freq_ratio > 0.9);
    }

    #[test]
    fn analyze_trace_matches_video_path() {
        let frames = pulse_frames(1.2, 10.0, 0.0);
        let audio = SyntheticAudio::new(None);
        let cfg = PulsecamConfig::default();
        let detailed = analyze_video_detailed(
            Path::new(CLIP),
            None,
            Sources {
                frames: &frames,
                audio: &audio,
            },
            &cfg,
        );
        let values = detailed.frames.iter().map(|f| f.channel_mean).collect();
        let direct = analyze_trace(&SignalTrace::from_uniform(30.0, values), &cfg);
        assert_eq!(Some(direct), detailed.trace);
    }
}
