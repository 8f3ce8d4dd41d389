use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plotters::prelude::*;
use pulsecam_lib::{
    analyze_trace, analyze_video_detailed, fingertip_check, heart_rate_check,
    io::{frames as frames_io, text as text_io},
    metrics::TraceQuality,
    plot::{figure_from_trace, Figure, PlotBackend, Series},
    screening::{validate_manual_bpm, DisorderEncoders, DisorderFeatures},
    snore_check, snore_from_wav, DefaultSources, FinalRateResult, PulsecamConfig, SignalTrace,
};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::{Path, PathBuf},
};

#[derive(Parser)]
#[command(
    name = "pulsecam",
    version,
    about = "pulsecam: heart rate and snoring from consumer video recordings"
)]
struct Cli {
    /// TOML configuration; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate heart rate (peak and FFT) and detect snoring in a video
    Analyze {
        video: PathBuf,
        /// Stop decoding after this many seconds
        #[arg(long)]
        duration: Option<f64>,
        /// Write per-frame channel/brightness means to CSV
        #[arg(long)]
        trace_out: Option<PathBuf>,
        /// Render the conditioned trace with detected beats to PNG
        #[arg(long)]
        plot: Option<PathBuf>,
        /// Print frame count, trace quality and the reconciled rate too
        #[arg(long)]
        detailed: bool,
    },
    /// Heart-rate screening step (20 s cap, implausible rates replaced)
    HeartRateCheck { video: PathBuf },
    /// Fingertip-on-lens check; fails when the rate is implausible
    FingertipCheck { video: PathBuf },
    /// Snore screening step on a video's audio track
    Snore {
        video: PathBuf,
        /// The patient reports snoring regardless of the recording
        #[arg(long)]
        manual: bool,
    },
    /// Snore classification of a WAV file
    SnoreWav { wav: PathBuf },
    /// Heart rate from newline-delimited samples (stdin or --input) or a frame CSV
    TraceRate {
        #[arg(long, default_value_t = 30.0)]
        fs: f64,
        #[arg(long, conflicts_with = "frames")]
        input: Option<PathBuf>,
        /// CSV written by `analyze --trace-out`
        #[arg(long)]
        frames: Option<PathBuf>,
    },
    /// Encoded feature vector for the sleep-disorder model
    DisorderFeatures {
        /// Heart rate in BPM (validated like a manual entry)
        #[arg(long, default_value_t = 70.0)]
        heart_rate: f64,
        #[arg(long, default_value_t = 30)]
        age: u32,
        #[arg(long, default_value = "Male")]
        gender: String,
        #[arg(long, default_value = "Normal")]
        bmi: String,
        #[arg(long, default_value_t = 7.0)]
        sleep_duration: f64,
        #[arg(long, default_value_t = 7)]
        quality_of_sleep: u32,
        #[arg(long, default_value_t = 5)]
        stress_level: u32,
        #[arg(long, default_value_t = 5)]
        physical_activity_level: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Analyze {
            video,
            duration,
            trace_out,
            plot,
            detailed,
        } => cmd_analyze(
            &video,
            duration,
            trace_out.as_deref(),
            plot.as_deref(),
            detailed,
            &cfg,
        )?,
        Commands::HeartRateCheck { video } => {
            let decoders = DefaultSources::from_config(&cfg);
            print_json(&heart_rate_check(&video, decoders.sources(), &cfg))?
        }
        Commands::FingertipCheck { video } => {
            let decoders = DefaultSources::from_config(&cfg);
            let reading = fingertip_check(&video, decoders.sources(), &cfg)?;
            print_json(&reading)?
        }
        Commands::Snore { video, manual } => {
            let decoders = DefaultSources::from_config(&cfg);
            print_json(&snore_check(&video, manual, decoders.sources(), &cfg))?
        }
        Commands::SnoreWav { wav } => print_json(&snore_from_wav(&wav, &cfg)?)?,
        Commands::TraceRate { fs, input, frames } => {
            cmd_trace_rate(fs, input.as_deref(), frames.as_deref(), &cfg)?
        }
        Commands::DisorderFeatures {
            heart_rate,
            age,
            gender,
            bmi,
            sleep_duration,
            quality_of_sleep,
            stress_level,
            physical_activity_level,
        } => {
            let features = DisorderFeatures {
                heart_rate: validate_manual_bpm(heart_rate)?,
                age,
                gender,
                bmi_category: bmi,
                sleep_duration,
                quality_of_sleep,
                stress_level,
                physical_activity_level,
            };
            let vector = features.to_vec(&DisorderEncoders::default())?;
            print_json(&FeatureOutput { features, vector })?
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PulsecamConfig> {
    match path {
        Some(path) => PulsecamConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PulsecamConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[derive(Serialize)]
struct FeatureOutput {
    features: DisorderFeatures,
    vector: Vec<f64>,
}

#[derive(Serialize)]
struct DetailedOutput {
    bpm_peaks: Option<f64>,
    bpm_fft: Option<f64>,
    snore_detected: bool,
    fps: Option<f64>,
    frames: usize,
    beats: usize,
    rate: FinalRateResult,
    quality: Option<TraceQuality>,
    brightness_quality: Option<TraceQuality>,
    low_freq_ratio: f64,
}

fn cmd_analyze(
    video: &Path,
    duration: Option<f64>,
    trace_out: Option<&Path>,
    plot: Option<&Path>,
    detailed: bool,
    cfg: &PulsecamConfig,
) -> Result<()> {
    let decoders = DefaultSources::from_config(cfg);
    let result = analyze_video_detailed(video, duration, decoders.sources(), cfg);
    if let Some(path) = trace_out {
        frames_io::write_frame_samples_csv(path, &result.frames)?;
    }
    if let Some(path) = plot {
        match &result.trace {
            Some(trace) => {
                let fig = figure_from_trace(&trace.conditioned, &trace.peaks.events, 4096);
                PngBackend::new(path).draw(&fig)?;
            }
            None => log::warn!("no frames decoded; skipping plot"),
        }
    }
    if detailed {
        print_json(&DetailedOutput {
            bpm_peaks: result.analysis.bpm_peaks,
            bpm_fft: result.analysis.bpm_fft,
            snore_detected: result.analysis.snore_detected,
            fps: result.fps,
            frames: result.frames.len(),
            beats: result.trace.as_ref().map_or(0, |t| t.peaks.events.len()),
            rate: result.rate(cfg),
            quality: result.trace.as_ref().map(|t| t.quality),
            brightness_quality: result.brightness_quality,
            low_freq_ratio: result.snore.low_freq_ratio,
        })
    } else {
        print_json(&result.analysis)
    }
}

#[derive(Serialize)]
struct TraceRateOutput {
    samples: usize,
    fs: f64,
    bpm_peaks: Option<f64>,
    bpm_fft: Option<f64>,
    beats: Vec<usize>,
    rate: FinalRateResult,
    quality: TraceQuality,
}

fn read_samples(input: Option<&Path>) -> Result<Vec<f64>> {
    match input {
        Some(path) => text_io::read_f64_series(path),
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            text_io::parse_f64_series(&buf)
        }
    }
}

fn cmd_trace_rate(
    fs: f64,
    input: Option<&Path>,
    frames: Option<&Path>,
    cfg: &PulsecamConfig,
) -> Result<()> {
    anyhow::ensure!(fs > 0.0, "--fs must be positive");
    let trace = match frames {
        Some(path) => {
            let (fs, samples) = frames_io::read_frame_samples_csv(path, cfg.video.fallback_fps)?;
            anyhow::ensure!(!samples.is_empty(), "{} has no frame rows", path.display());
            SignalTrace::from_uniform(fs, samples.iter().map(|s| s.channel_mean).collect())
        }
        None => SignalTrace::from_uniform(fs, read_samples(input)?),
    };
    let analysis = analyze_trace(&trace, cfg);
    print_json(&TraceRateOutput {
        samples: trace.len(),
        fs: trace.fs,
        bpm_peaks: analysis.peaks.estimate.value_bpm,
        bpm_fft: analysis.fft.value_bpm,
        beats: analysis.peaks.events.indices,
        rate: analysis.rate,
        quality: analysis.quality,
    })
}

/// PNG output through plotters' bitmap backend.
struct PngBackend<'a> {
    path: &'a Path,
    size: (u32, u32),
}

impl<'a> PngBackend<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            size: (960, 480),
        }
    }
}

impl PlotBackend for PngBackend<'_> {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        let root = BitMapBackend::new(self.path, self.size).into_drawing_area();
        root.fill(&WHITE)?;
        let (x_min, x_max, y_min, y_max) = fig.bounds();
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(
                fig.title.clone().unwrap_or_else(|| "Plot".into()),
                ("sans-serif", 24),
            )
            .x_label_area_size(36)
            .y_label_area_size(48)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)?;
        chart
            .configure_mesh()
            .x_desc(fig.x.label.clone().unwrap_or_default())
            .y_desc(fig.y.label.clone().unwrap_or_default())
            .draw()?;
        for series in &fig.series {
            match series {
                Series::Line(line) => {
                    let (r, g, b) = line.style.color.rgb();
                    chart.draw_series(LineSeries::new(
                        line.points.iter().map(|p| (p[0], p[1])),
                        RGBColor(r, g, b).stroke_width(line.style.width.round().max(1.0) as u32),
                    ))?;
                }
                Series::Points(points) => {
                    let (r, g, b) = points.color.rgb();
                    let style = RGBColor(r, g, b).filled();
                    chart.draw_series(
                        points
                            .points
                            .iter()
                            .map(|p| Circle::new((p[0], p[1]), points.radius, style)),
                    )?;
                }
            }
        }
        root.present()?;
        Ok(())
    }
}
