use crate::{
    config::PeakConfig,
    signal::{BeatIntervals, Events, RateEstimate, RateMethod, SignalTrace},
};
use serde::{Deserialize, Serialize};

/// Beats found in a conditioned trace plus the rate derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakDetection {
    pub events: Events,
    pub intervals: BeatIntervals,
    pub estimate: RateEstimate,
}

/// Detect cardiac-cycle peaks on the smoothed rectified envelope.
///
/// The rectified envelope has one maximum per half cycle; only maxima where
/// the conditioned signal is positive are kept, so each beat is counted once.
pub fn detect_beats(trace: &SignalTrace, cfg: &PeakConfig) -> Events {
    let n = trace.len();
    let fs = trace.fs;
    if n < 3 || !fs.is_finite() || fs <= 0.0 {
        return Events::default();
    }
    let envelope = rectify(&trace.values);
    let win = ((cfg.smoothing_window_s * fs) as usize).clamp(1, n);
    let smooth = centered_moving_average(&envelope, win);
    let candidates: Vec<usize> = local_maxima(&smooth)
        .into_iter()
        .filter(|&i| trace.values[i] > 0.0)
        .collect();
    let distance = (cfg.min_separation_s * fs).ceil().max(1.0) as usize;
    Events::from_indices(select_by_distance(&candidates, &smooth, distance))
}

/// Peak-interval rate estimate; absent with fewer than two beats.
pub fn run_peak_pipeline(trace: &SignalTrace, cfg: &PeakConfig) -> PeakDetection {
    let events = detect_beats(trace, cfg);
    let intervals = BeatIntervals::from_events(&events, &trace.timestamps);
    let estimate = match intervals.mean() {
        Some(mean) if mean > 0.0 => RateEstimate::present(RateMethod::Peak, 60.0 / mean),
        _ => RateEstimate::absent(RateMethod::Peak),
    };
    log::debug!(
        "peak estimator: {} beats, {:?} BPM",
        events.len(),
        estimate.value_bpm
    );
    PeakDetection {
        events,
        intervals,
        estimate,
    }
}

pub fn estimate_peak_rate(trace: &SignalTrace, cfg: &PeakConfig) -> RateEstimate {
    run_peak_pipeline(trace, cfg).estimate
}

fn rectify(data: &[f64]) -> Vec<f64> {
    data.iter().map(|x| x.abs()).collect()
}

/// Same-length moving average, zero-padded beyond both edges. Output `i`
/// averages `data[i + off + 1 - win ..= i + off]` with `off = (win - 1) / 2`.
fn centered_moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    if win <= 1 {
        return data.to_vec();
    }
    let n = data.len();
    let mut prefix = vec![0.0; n + 1];
    for (i, &sample) in data.iter().enumerate() {
        prefix[i + 1] = prefix[i] + sample;
    }
    let off = (win - 1) / 2;
    (0..n)
        .map(|i| {
            let hi = (i + off + 1).min(n);
            let lo = (i + off + 1).saturating_sub(win).min(hi);
            (prefix[hi] - prefix[lo]) / win as f64
        })
        .collect()
}

/// Strict interior local maxima; flat tops resolve to their midpoint.
fn local_maxima(data: &[f64]) -> Vec<usize> {
    let n = data.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a taller one, tallest first.
fn select_by_distance(peaks: &[usize], heights: &[f64], distance: usize) -> Vec<usize> {
    if peaks.len() < 2 || distance <= 1 {
        return peaks.to_vec();
    }
    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| heights[peaks[b]].total_cmp(&heights[peaks[a]]).then(a.cmp(&b)));
    for &i in &order {
        if !keep[i] {
            continue;
        }
        let mut k = i;
        while k > 0 && peaks[i] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }
        let mut k = i + 1;
        while k < peaks.len() && peaks[k] - peaks[i] < distance {
            keep[k] = false;
            k += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}
