//! Contracts for the screening collaborators: the pretrained heartbeat and
//! sleep-disorder classifiers, their label encoders, and the patient report.

use crate::error::{PulsecamError, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

/// Upload extensions accepted for recordings (compared case-insensitively).
pub const SUPPORTED_VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "webm"];

pub const MANUAL_BPM_MIN: f64 = 40.0;
pub const MANUAL_BPM_MAX: f64 = 180.0;

/// A fitted model mapping a fixed-length feature vector to a class code.
pub trait Classifier {
    fn predict(&self, features: &[f64]) -> Result<usize>;
}

impl<F> Classifier for F
where
    F: Fn(&[f64]) -> Result<usize>,
{
    fn predict(&self, features: &[f64]) -> Result<usize> {
        self(features)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatLabel {
    Normal,
    Abnormal,
}

impl HeartbeatLabel {
    /// Class 0 is normal; every other class is abnormal.
    pub fn from_code(code: usize) -> Self {
        if code == 0 {
            HeartbeatLabel::Normal
        } else {
            HeartbeatLabel::Abnormal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HeartbeatLabel::Normal => "normal",
            HeartbeatLabel::Abnormal => "abnormal",
        }
    }
}

impl fmt::Display for HeartbeatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatFeatures {
    pub bpm: f64,
}

impl HeartbeatFeatures {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.bpm]
    }

    pub fn classify(&self, model: &dyn Classifier) -> Result<HeartbeatLabel> {
        model.predict(&self.to_vec()).map(HeartbeatLabel::from_code)
    }
}

/// Sorted class list; a label's code is its index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn gender() -> Self {
        Self::new(["Female", "Male"])
    }

    pub fn bmi() -> Self {
        Self::new(["Normal", "Normal Weight", "Obese", "Overweight"])
    }

    pub fn disorder() -> Self {
        Self::new(["Insomnia", "None", "Sleep Apnea"])
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn inverse(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }
}

/// Encoders the disorder model was fitted with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisorderEncoders {
    pub gender: LabelEncoder,
    pub bmi: LabelEncoder,
    pub disorder: LabelEncoder,
}

impl Default for DisorderEncoders {
    fn default() -> Self {
        Self {
            gender: LabelEncoder::gender(),
            bmi: LabelEncoder::bmi(),
            disorder: LabelEncoder::disorder(),
        }
    }
}

/// Inputs of the sleep-disorder model. Fields the screening flow does not
/// collect keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisorderFeatures {
    pub heart_rate: f64,
    pub age: u32,
    pub gender: String,
    pub bmi_category: String,
    pub sleep_duration: f64,
    pub quality_of_sleep: u32,
    pub stress_level: u32,
    pub physical_activity_level: u32,
}

impl Default for DisorderFeatures {
    fn default() -> Self {
        Self {
            heart_rate: 70.0,
            age: 30,
            gender: "Male".into(),
            bmi_category: "Normal".into(),
            sleep_duration: 7.0,
            quality_of_sleep: 7,
            stress_level: 5,
            physical_activity_level: 5,
        }
    }
}

impl DisorderFeatures {
    /// `[heart_rate, age, gender, bmi, sleep_duration, quality_of_sleep,
    /// stress_level, physical_activity_level]` with labels encoded.
    pub fn to_vec(&self, encoders: &DisorderEncoders) -> Result<Vec<f64>> {
        let gender = encoders.gender.transform(&self.gender).ok_or_else(|| {
            PulsecamError::UnsupportedInput(format!("unknown gender `{}`", self.gender))
        })?;
        let bmi = encoders.bmi.transform(&self.bmi_category).ok_or_else(|| {
            PulsecamError::UnsupportedInput(format!("unknown BMI category `{}`", self.bmi_category))
        })?;
        Ok(vec![
            self.heart_rate,
            self.age as f64,
            gender as f64,
            bmi as f64,
            self.sleep_duration,
            self.quality_of_sleep as f64,
            self.stress_level as f64,
            self.physical_activity_level as f64,
        ])
    }

    /// Run the model and decode its class; the `None` class reads as
    /// "no disorder".
    pub fn classify(&self, model: &dyn Classifier, encoders: &DisorderEncoders) -> Result<String> {
        let code = model.predict(&self.to_vec(encoders)?)?;
        let label = encoders
            .disorder
            .inverse(code)
            .ok_or_else(|| PulsecamError::Classifier(format!("unknown disorder class {code}")))?;
        Ok(describe_disorder(label))
    }
}

pub fn describe_disorder(label: &str) -> String {
    if label == "None" {
        "no disorder".into()
    } else {
        label.into()
    }
}

/// Accept a manually entered heart rate only inside 40-180 BPM.
pub fn validate_manual_bpm(bpm: f64) -> Result<f64> {
    if (MANUAL_BPM_MIN..=MANUAL_BPM_MAX).contains(&bpm) {
        Ok(bpm)
    } else {
        Err(PulsecamError::InvalidBpm {
            bpm,
            min: MANUAL_BPM_MIN,
            max: MANUAL_BPM_MAX,
        })
    }
}

pub fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            SUPPORTED_VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Downloadable plain-text patient report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub bpm: f64,
    /// Model verdict such as `normal`, `average` or `danger`.
    pub situation: String,
    pub snore: bool,
}

impl ScreeningReport {
    /// Symptoms typically associated with the situation.
    pub fn conditions(&self) -> &'static str {
        match self.situation.to_lowercase().as_str() {
            "normal" => {
                "Feeling energetic and alert\n\
                 Good concentration and focus\n\
                 Normal breathing\n\
                 Balanced mood\n\
                 Healthy sleep patterns"
            }
            "average" => {
                "Fatigue or tiredness\n\
                 Shortness of breath during activity\n\
                 Dizziness or lightheadedness\n\
                 Irregular heartbeat\n\
                 Reduced exercise tolerance"
            }
            "danger" => {
                "Chest pain or discomfort\n\
                 Severe shortness of breath\n\
                 Fainting or loss of consciousness\n\
                 Rapid or irregular heartbeat\n\
                 Confusion or disorientation\n\
                 Extreme fatigue"
            }
            _ => "Conditions not determined.",
        }
    }

    pub fn summary(&self) -> &'static str {
        if self.situation.eq_ignore_ascii_case("normal") {
            "The patient's heart rate and sleep patterns appear normal. Continue monitoring daily."
        } else {
            "Abnormal sleep patterns detected. No need to worry, the patient is alright. \
             If this continues for 2 days, consult a specialist for better health. \
             Recommend consulting a certified sleep specialist."
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Patient Sleep Report\n\n\
             Patient Name: {}\n\
             Age: {}\n\
             Gender: {}\n\
             Heart Rate (BPM): {}\n\
             Patient Situation: {}\n\
             Snore Detected: {}\n\n\
             Patient Conditions:\n{}\n\n\
             Report Summary:\n{}\n",
            self.name,
            self.age,
            self.gender,
            self.bpm,
            self.situation,
            if self.snore { "Yes" } else { "No" },
            self.conditions(),
            self.summary()
        )
    }
}
