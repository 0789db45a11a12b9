pub mod ai_forensics;
pub mod splicing;

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use log::{error, warn};
use serde::Serialize;

use crate::{error::Result, report::visualization::Visualizer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DetectorKind {
    Metadata,
    #[serde(rename = "ELA")]
    Ela,
    #[serde(rename = "Noise Variance")]
    NoiseVariance,
    #[serde(rename = "AI Forensics")]
    AiForensics,
}

impl DetectorKind {
    /// Fixed reporting order of an analysis.
    pub const ALL: [DetectorKind; 4] = [
        DetectorKind::Metadata,
        DetectorKind::Ela,
        DetectorKind::NoiseVariance,
        DetectorKind::AiForensics,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DetectorKind::Metadata => "Metadata",
            DetectorKind::Ela => "ELA",
            DetectorKind::NoiseVariance => "Noise Variance",
            DetectorKind::AiForensics => "AI Forensics",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordinal severity: `Pass < Warning < Fail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "Pass",
            Verdict::Warning => "Warning",
            Verdict::Fail => "Fail",
        };
        f.write_str(label)
    }
}

/// Outcome of one detection method. `score` is a manipulation probability
/// in `0..=100` from the detector's own perspective.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorResult {
    pub detector: DetectorKind,
    #[serde(rename = "result")]
    pub verdict: Verdict,
    pub details: String,
    pub score: f64,
}

impl DetectorResult {
    pub fn new(detector: DetectorKind, verdict: Verdict, score: f64, details: impl Into<String>) -> Self {
        Self {
            detector,
            verdict,
            details: details.into(),
            score: score.clamp(0.0, 100.0),
        }
    }

    pub fn warning(detector: DetectorKind, score: f64, details: impl Into<String>) -> Self {
        Self::new(detector, Verdict::Warning, score, details)
    }
}

#[derive(Debug, Clone)]
pub struct DetectorOutput {
    pub result: DetectorResult,
    /// Encoded JPEG diagnostic overlay, for detectors that draw one.
    pub visualization: Option<Vec<u8>>,
}

impl DetectorOutput {
    pub fn plain(result: DetectorResult) -> Self {
        Self { result, visualization: None }
    }

    pub fn with_visualization(result: DetectorResult, visualization: Vec<u8>) -> Self {
        Self { result, visualization: Some(visualization) }
    }
}

pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Score reported when the detector cannot complete.
    fn fallback_score(&self) -> f64;

    fn fallback_details(&self, error: &str) -> String;

    fn produces_visualization(&self) -> bool {
        false
    }

    fn detect(&self, bytes: &[u8]) -> Result<DetectorOutput>;

    /// Runs the detector and never fails: errors and panics inside `detect`
    /// become a Warning result carrying the fallback score.
    fn evaluate(&self, bytes: &[u8]) -> DetectorOutput {
        match panic::catch_unwind(AssertUnwindSafe(|| self.detect(bytes))) {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!("{} detector degraded: {}", self.kind(), err);
                self.degraded(&err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!("{} detector panicked: {}", self.kind(), message);
                self.degraded(&message)
            }
        }
    }

    fn degraded(&self, error: &str) -> DetectorOutput {
        let result = DetectorResult::warning(
            self.kind(),
            self.fallback_score(),
            self.fallback_details(error),
        );

        if self.produces_visualization() {
            DetectorOutput::with_visualization(result, Visualizer::new().placeholder_jpeg())
        } else {
            DetectorOutput::plain(result)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}
