use image::DynamicImage;
use log::debug;
use serde::Serialize;

use crate::{
    analysis::{copy_move::CopyMoveDetector, frequency::FrequencyAnalyzer, jpeg_analysis::JpegAnalyzer},
    detection::{Detector, DetectorKind, DetectorOutput, DetectorResult, Verdict, splicing::SplicingDetector},
    error::Result,
    image_utils::decode,
};

const COPY_MOVE_WEIGHT: f64 = 0.35;
const SPLICING_WEIGHT: f64 = 0.30;
const COMPRESSION_WEIGHT: f64 = 0.15;
const FREQUENCY_WEIGHT: f64 = 0.20;

/// Sub-scores of the composite heuristic suite, each in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForensicBreakdown {
    pub copy_move: f64,
    pub splicing: f64,
    pub compression: f64,
    pub frequency: f64,
}

impl ForensicBreakdown {
    pub fn composite(&self) -> f64 {
        self.copy_move * COPY_MOVE_WEIGHT
            + self.splicing * SPLICING_WEIGHT
            + self.compression * COMPRESSION_WEIGHT
            + self.frequency * FREQUENCY_WEIGHT
    }

    pub fn verdict(&self) -> Verdict {
        let composite = self.composite();
        if composite > 65.0 {
            Verdict::Fail
        } else if composite > 35.0 {
            Verdict::Warning
        } else {
            Verdict::Pass
        }
    }

    fn report(&self) -> String {
        let line = |name: &str, value: f64, threshold: f64, bad: &str, good: &str| {
            if value > threshold {
                format!("⚠️ {}: {:.1}% - {}", name, value, bad)
            } else {
                format!("✓ {}: {:.1}% - {}", name, value, good)
            }
        };

        [
            format!("🤖 Composite forensic score: {:.1}%", self.composite()),
            String::new(),
            line(
                "Copy-Move Detection",
                self.copy_move,
                40.0,
                "Suspicious duplicate regions found",
                "No significant duplications",
            ),
            line(
                "Splicing Analysis",
                self.splicing,
                40.0,
                "Inconsistent image features detected",
                "Features appear consistent",
            ),
            line(
                "Compression Analysis",
                self.compression,
                50.0,
                "Multiple compression cycles detected",
                "Normal compression pattern",
            ),
            line(
                "Frequency Analysis",
                self.frequency,
                35.0,
                "Unnatural frequency distribution",
                "Natural frequency characteristics",
            ),
        ]
        .join("\n")
    }
}

pub struct AiForensicsDetector {
    copy_move: CopyMoveDetector,
    splicing: SplicingDetector,
    jpeg: JpegAnalyzer,
    frequency: FrequencyAnalyzer,
}

impl AiForensicsDetector {
    pub fn new() -> Self {
        Self {
            copy_move: CopyMoveDetector::default(),
            splicing: SplicingDetector::new(),
            jpeg: JpegAnalyzer::new(),
            frequency: FrequencyAnalyzer::default(),
        }
    }

    pub fn with_copy_move(mut self, detector: CopyMoveDetector) -> Self {
        self.copy_move = detector;
        self
    }

    pub fn with_frequency(mut self, analyzer: FrequencyAnalyzer) -> Self {
        self.frequency = analyzer;
        self
    }

    pub fn breakdown(&self, image: &DynamicImage) -> ForensicBreakdown {
        let rgb = image.to_rgb8();

        let ((copy_move, splicing), (compression, frequency)) = rayon::join(
            || (self.copy_move.detect(image).score, self.splicing.analyze(&rgb)),
            || (self.jpeg.analyze(image), self.frequency.analyze(image)),
        );

        ForensicBreakdown { copy_move, splicing, compression, frequency }
    }
}

impl Default for AiForensicsDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for AiForensicsDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::AiForensics
    }

    fn fallback_score(&self) -> f64 {
        10.0
    }

    fn fallback_details(&self, error: &str) -> String {
        format!("AI forensic analysis encountered an error: {}", error)
    }

    fn detect(&self, bytes: &[u8]) -> Result<DetectorOutput> {
        let image = decode(bytes)?;
        let breakdown = self.breakdown(&image);
        debug!("AI forensics: {:?}", breakdown);

        let result = DetectorResult::new(
            DetectorKind::AiForensics,
            breakdown.verdict(),
            breakdown.composite().round(),
            breakdown.report(),
        );

        Ok(DetectorOutput::plain(result))
    }
}
