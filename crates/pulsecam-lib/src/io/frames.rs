use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::path::Path;

use crate::signal::FrameSample;

/// Write per-frame measurements as CSV with a
/// `timestamp,channel_mean,brightness_mean` header.
pub fn write_frame_samples_csv(path: &Path, samples: &[FrameSample]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    for sample in samples {
        writer.serialize(sample).context("writing frame sample")?;
    }
    writer.flush().context("flushing frame samples")?;
    Ok(())
}

/// Read frame samples written by [`write_frame_samples_csv`] and infer the
/// frame rate from the first timestamp step (`fallback_fps` when fewer than
/// two rows or a non-increasing step).
pub fn read_frame_samples_csv(path: &Path, fallback_fps: f64) -> Result<(f64, Vec<FrameSample>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut samples = Vec::new();
    for record in reader.deserialize() {
        let sample: FrameSample = record.context("reading frame sample")?;
        samples.push(sample);
    }
    let fs = match samples.as_slice() {
        [a, b, ..] if b.timestamp > a.timestamp => 1.0 / (b.timestamp - a.timestamp),
        _ => fallback_fps,
    };
    Ok((fs, samples))
}
