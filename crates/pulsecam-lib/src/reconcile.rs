use crate::{
    config::{FingertipCheckConfig, HeartRateCheckConfig, ReconcileConfig},
    error::{PulsecamError, Result},
    signal::{FinalRateResult, RateEstimate, RateSource},
};
use serde::{Deserialize, Serialize};

/// Merge the two estimates: the spectral estimate wins when present, then the
/// peak estimate, then the configured default.
pub fn reconcile(peak: RateEstimate, fft: RateEstimate, cfg: &ReconcileConfig) -> FinalRateResult {
    let result = [fft, peak]
        .into_iter()
        .find_map(|estimate| {
            estimate.value_bpm.map(|bpm| FinalRateResult {
                bpm,
                source: estimate.method.into(),
            })
        })
        .unwrap_or(FinalRateResult {
            bpm: cfg.default_bpm,
            source: RateSource::Default,
        });
    log::debug!("reconciled {:.1} BPM from {:?}", result.bpm, result.source);
    result
}

/// What a caller does with a reconciled rate outside its accepted range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RangePolicy {
    /// Replace out-of-range values with `fallback`.
    Substitute { min: f64, max: f64, fallback: f64 },
    /// Reject out-of-range values.
    Abort { min: f64, max: f64 },
}

impl RangePolicy {
    pub fn contains(&self, bpm: f64) -> bool {
        let (min, max) = match *self {
            RangePolicy::Substitute { min, max, .. } | RangePolicy::Abort { min, max } => {
                (min, max)
            }
        };
        (min..=max).contains(&bpm)
    }

    pub fn apply(&self, result: FinalRateResult) -> Result<HeartRateReading> {
        if self.contains(result.bpm) {
            return Ok(HeartRateReading {
                bpm: result.bpm,
                source: result.source,
                substituted: false,
            });
        }
        match *self {
            RangePolicy::Substitute { fallback, .. } => {
                log::warn!(
                    "{:.1} BPM outside accepted range, using {fallback} BPM",
                    result.bpm
                );
                Ok(HeartRateReading {
                    bpm: fallback,
                    source: result.source,
                    substituted: true,
                })
            }
            RangePolicy::Abort { .. } => {
                Err(PulsecamError::FingerNotDetected { bpm: result.bpm })
            }
        }
    }
}

impl From<&HeartRateCheckConfig> for RangePolicy {
    fn from(cfg: &HeartRateCheckConfig) -> Self {
        RangePolicy::Substitute {
            min: cfg.min_bpm,
            max: cfg.max_bpm,
            fallback: cfg.fallback_bpm,
        }
    }
}

impl From<&FingertipCheckConfig> for RangePolicy {
    fn from(cfg: &FingertipCheckConfig) -> Self {
        RangePolicy::Abort {
            min: cfg.min_bpm,
            max: cfg.max_bpm,
        }
    }
}

/// Heart rate accepted by a call-site policy. `source` is where the
/// reconciled value came from, even when it was substituted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartRateReading {
    pub bpm: f64,
    pub source: RateSource,
    pub substituted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::RateMethod;

    fn peak(bpm: Option<f64>) -> RateEstimate {
        RateEstimate {
            value_bpm: bpm,
            method: RateMethod::Peak,
        }
    }

    fn fft(bpm: Option<f64>) -> RateEstimate {
        RateEstimate {
            value_bpm: bpm,
            method: RateMethod::Fft,
        }
    }

    #[test]
    fn fft_takes_precedence() {
        let cfg = ReconcileConfig::default();
        let r = reconcile(peak(Some(80.0)), fft(Some(72.0)), &cfg);
        assert_eq!(r, FinalRateResult { bpm: 72.0, source: RateSource::Fft });
        let r = reconcile(peak(Some(80.0)), fft(None), &cfg);
        assert_eq!(r, FinalRateResult { bpm: 80.0, source: RateSource::Peak });
    }

    #[test]
    fn nothing_present_gives_exact_default() {
        let r = reconcile(peak(None), fft(None), &ReconcileConfig::default());
        assert_eq!(r.bpm, 70.0);
        assert_eq!(r.source, RateSource::Default);
    }

    #[test]
    fn substitute_policy_replaces_out_of_range() {
        let policy = RangePolicy::from(&HeartRateCheckConfig::default());
        let low = policy
            .apply(FinalRateResult { bpm: 35.0, source: RateSource::Fft })
            .unwrap();
        assert_eq!(low.bpm, 70.0);
        assert!(low.substituted);
        for edge in [40.0, 180.0] {
            let ok = policy
                .apply(FinalRateResult { bpm: edge, source: RateSource::Peak })
                .unwrap();
            assert_eq!(ok.bpm, edge);
            assert!(!ok.substituted);
        }
        assert!(policy
            .apply(FinalRateResult { bpm: 180.5, source: RateSource::Fft })
            .unwrap()
            .substituted);
    }

    #[test]
    fn abort_policy_rejects_out_of_range() {
        let policy = RangePolicy::from(&FingertipCheckConfig::default());
        let err = policy
            .apply(FinalRateResult { bpm: 162.0, source: RateSource::Fft })
            .unwrap_err();
        assert!(matches!(err, PulsecamError::FingerNotDetected { bpm } if bpm == 162.0));
        assert!(policy
            .apply(FinalRateResult { bpm: 49.9, source: RateSource::Peak })
            .is_err());
        let default = reconcile(peak(None), fft(None), &ReconcileConfig::default());
        let reading = policy.apply(default).unwrap();
        assert_eq!(reading.bpm, 70.0);
        assert_eq!(reading.source, RateSource::Default);
    }
}
