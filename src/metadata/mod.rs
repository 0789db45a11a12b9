pub mod exif;

use log::debug;

use crate::{
    detection::{Detector, DetectorKind, DetectorOutput, DetectorResult, Verdict},
    error::Result,
    image_utils,
};

use self::exif::{ExifExtractor, ExifSummary};

const HEAVY_EDITORS: &[&str] = &["photoshop", "gimp", "affinity photo", "pixelmator", "lightroom"];
const LIGHT_PROCESSORS: &[&str] = &["canva", "snapseed", "vsco", "instagram", "facebook", "whatsapp"];
const CAMERA_FIRMWARE: &[&str] = &["nikon", "canon", "sony", "fujifilm", "olympus", "pentax", "apple"];

/// Seconds a modification timestamp may trail the creation timestamp.
const DATE_TOLERANCE_SECS: i64 = 60;
const DIMENSION_TOLERANCE: u32 = 4;

const NO_EXIF_SCORE: f64 = 10.0;
const NO_EXIF_MESSAGE: &str =
    "No EXIF metadata found. Could indicate screenshot, web download, or metadata stripping.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftwareClass {
    HeavyEditor,
    LightProcessor,
    CameraFirmware,
    Unknown,
}

impl SoftwareClass {
    pub fn classify(software: &str) -> Self {
        let lower = software.to_lowercase();
        let matches = |names: &[&str]| names.iter().any(|n| lower.contains(n));

        if matches(HEAVY_EDITORS) {
            SoftwareClass::HeavyEditor
        } else if matches(LIGHT_PROCESSORS) {
            SoftwareClass::LightProcessor
        } else if lower.trim().is_empty() || matches(CAMERA_FIRMWARE) {
            SoftwareClass::CameraFirmware
        } else {
            SoftwareClass::Unknown
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Suspicious,
    Clean,
    /// Scored but not worth listing in the details.
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub label: String,
    pub score: f64,
    pub kind: SignalKind,
}

impl Signal {
    fn suspicious(label: impl Into<String>, score: f64) -> Self {
        Self { label: label.into(), score, kind: SignalKind::Suspicious }
    }

    fn clean(label: impl Into<String>, score: f64) -> Self {
        Self { label: label.into(), score, kind: SignalKind::Clean }
    }
}

#[derive(Debug, Default)]
pub struct MetadataDetector;

impl MetadataDetector {
    pub fn new() -> Self {
        Self
    }

    /// Independent metadata signals for an image whose decoded size is `actual`.
    pub fn signals(&self, summary: &ExifSummary, actual: (u32, u32)) -> Vec<Signal> {
        let mut signals = Vec::new();

        signals.push(self.software_signal(summary.software.as_deref()));
        signals.push(self.date_signal(summary));
        signals.extend(self.camera_signal(summary));
        signals.extend(self.dimension_signal(summary, actual));

        signals
    }

    fn software_signal(&self, software: Option<&str>) -> Signal {
        let software = software.unwrap_or("");

        match SoftwareClass::classify(software) {
            SoftwareClass::HeavyEditor => Signal::suspicious(format!("Edited with {}", software), 45.0),
            SoftwareClass::LightProcessor => {
                Signal::suspicious(format!("Processed with {}", software), 20.0)
            }
            SoftwareClass::CameraFirmware => Signal {
                label: "Camera firmware or no software tag".into(),
                score: 0.0,
                kind: SignalKind::Neutral,
            },
            SoftwareClass::Unknown => Signal::clean(format!("Unknown software: {}", software), 10.0),
        }
    }

    fn date_signal(&self, summary: &ExifSummary) -> Signal {
        let Some(created) = summary.create_date else {
            return Signal::suspicious("Missing original creation date", 25.0);
        };

        match summary.modify_date {
            Some(modified) if modified > created + DATE_TOLERANCE_SECS => {
                let days = ((modified - created) as f64 / 86_400.0).round();
                Signal::suspicious(
                    format!("Modified {} days after creation, possible re-editing", days),
                    30.0,
                )
            }
            _ => Signal::clean("Timestamps consistent", 0.0),
        }
    }

    fn camera_signal(&self, summary: &ExifSummary) -> Option<Signal> {
        match (&summary.make, &summary.model) {
            (Some(make), Some(model)) => Some(Signal::clean(format!("Camera: {} {}", make, model), 0.0)),
            (None, None) if summary.create_date.is_some() => Some(Signal::suspicious(
                "No camera make/model, unusual for a real camera photo",
                15.0,
            )),
            _ => None,
        }
    }

    fn dimension_signal(&self, summary: &ExifSummary, actual: (u32, u32)) -> Option<Signal> {
        let (reported_w, reported_h) = summary.reported_dimensions?;
        let (actual_w, actual_h) = actual;

        let mismatch = reported_w.abs_diff(actual_w) > DIMENSION_TOLERANCE
            || reported_h.abs_diff(actual_h) > DIMENSION_TOLERANCE;

        if mismatch {
            Some(Signal::suspicious(
                format!(
                    "Dimension mismatch: EXIF says {}×{} but actual is {}×{}",
                    reported_w, reported_h, actual_w, actual_h
                ),
                40.0,
            ))
        } else {
            Some(Signal::clean("Dimensions match EXIF records", 0.0))
        }
    }

    pub fn score(&self, signals: &[Signal]) -> DetectorResult {
        let total = signals.iter().map(|s| s.score).sum::<f64>().min(100.0);

        let verdict = if total >= 50.0 {
            Verdict::Fail
        } else if total >= 20.0 {
            Verdict::Warning
        } else {
            Verdict::Pass
        };

        DetectorResult::new(DetectorKind::Metadata, verdict, total, Self::details(signals))
    }

    fn details(signals: &[Signal]) -> String {
        let suspicious = signals
            .iter()
            .filter(|s| s.kind == SignalKind::Suspicious)
            .collect::<Vec<_>>();
        let clean = signals
            .iter()
            .filter(|s| s.kind == SignalKind::Clean)
            .collect::<Vec<_>>();

        let mut lines = Vec::new();
        if suspicious.is_empty() {
            lines.push("✓ No suspicious metadata signals found.".to_string());
        } else {
            lines.push(format!("⚠️ {} suspicious metadata signal(s):", suspicious.len()));
            lines.extend(suspicious.iter().map(|s| format!("  • {}", s.label)));
        }

        if !clean.is_empty() {
            lines.push(String::new());
            lines.push("✓ Clean signals:".to_string());
            lines.extend(clean.iter().map(|s| format!("  • {}", s.label)));
        }

        lines.join("\n")
    }
}

impl Detector for MetadataDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Metadata
    }

    fn fallback_score(&self) -> f64 {
        NO_EXIF_SCORE
    }

    fn fallback_details(&self, error: &str) -> String {
        format!("Could not read image metadata: {}", error)
    }

    fn detect(&self, bytes: &[u8]) -> Result<DetectorOutput> {
        let actual = image_utils::dimensions(bytes)?;

        let summary = match ExifExtractor::extract(bytes) {
            Ok(Some(summary)) => summary,
            Ok(None) => {
                return Ok(DetectorOutput::plain(DetectorResult::warning(
                    DetectorKind::Metadata,
                    NO_EXIF_SCORE,
                    NO_EXIF_MESSAGE,
                )));
            }
            Err(err) => {
                debug!("unparsable EXIF block: {}", err);
                return Ok(DetectorOutput::plain(DetectorResult::warning(
                    DetectorKind::Metadata,
                    NO_EXIF_SCORE,
                    format!("EXIF metadata is present but could not be parsed: {}", err),
                )));
            }
        };

        let signals = self.signals(&summary, actual);
        let result = self.score(&signals);
        debug!("metadata: {} signals, score {}", signals.len(), result.score);

        Ok(DetectorOutput::plain(result))
    }
}
