use std::{fs, path::Path};

use base64::{Engine, engine::general_purpose::STANDARD};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    analysis::{copy_move::CopyMoveDetector, ela::ElaAnalyzer, frequency::FrequencyAnalyzer, noise::NoiseAnalyzer},
    detection::{Detector, DetectorOutput, DetectorResult, ai_forensics::AiForensicsDetector},
    error::{ForensicsError, Result},
    metadata::MetadataDetector,
    report::visualization::{VisualizationConfig, Visualizer},
    scoring::DetectorWeights,
};

pub mod error;
pub mod image_utils;
pub mod analysis;
pub mod detection;
pub mod metadata;
pub mod report;
pub mod scoring;

pub use detection::{DetectorKind, Verdict};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub ela_qualities: Vec<u8>,
    pub ela_visualization_quality: u8,
    pub noise_block_size: u32,
    pub copy_move_working_size: u32,
    pub copy_move_block_size: u32,
    pub copy_move_stride: u32,
    pub frequency_working_size: u32,
    pub weights: DetectorWeights,
    pub consensus_adjustment: f64,
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            ela_qualities: vec![75, 85, 95],
            ela_visualization_quality: 90,
            noise_block_size: 32,
            copy_move_working_size: 256,
            copy_move_block_size: 16,
            copy_move_stride: 8,
            frequency_working_size: 128,
            weights: DetectorWeights::default(),
            consensus_adjustment: 8.0,
            parallel: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if (self.weights.sum() - 1.0).abs() > 1e-9 {
            return Err(ForensicsError::InvalidParameter(format!(
                "detector weights must sum to 1.0, got {}",
                self.weights.sum()
            )));
        }
        if self.ela_qualities.is_empty() || self.ela_qualities.iter().any(|&q| q == 0 || q > 100) {
            return Err(ForensicsError::InvalidParameter(
                "ELA qualities must be within 1..=100".into(),
            ));
        }
        if self.ela_visualization_quality == 0 || self.ela_visualization_quality > 100 {
            return Err(ForensicsError::InvalidParameter(
                "visualization quality must be within 1..=100".into(),
            ));
        }
        if self.noise_block_size == 0 || self.frequency_working_size == 0 {
            return Err(ForensicsError::InvalidParameter("block sizes must be positive".into()));
        }
        CopyMoveDetector::new(
            self.copy_move_working_size,
            self.copy_move_block_size,
            self.copy_move_stride,
        )?;
        Ok(())
    }

    fn visualizer(&self) -> Visualizer {
        Visualizer::with_config(VisualizationConfig {
            jpeg_quality: self.ela_visualization_quality,
            ..VisualizationConfig::default()
        })
    }
}

/// Square tile of the analysed image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// JPEG-encoded diagnostic overlays.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugImages {
    pub ela: Vec<u8>,
    pub noise_map: Vec<u8>,
}

impl DebugImages {
    pub fn ela_data_uri(&self) -> String {
        data_uri(&self.ela)
    }

    pub fn noise_map_data_uri(&self) -> String {
        data_uri(&self.noise_map)
    }

    /// Writes `ela.jpg` and `noise_map.jpg` into `dir`.
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(dir.join("ela.jpg"), &self.ela)?;
        fs::write(dir.join("noise_map.jpg"), &self.noise_map)?;
        Ok(())
    }
}

fn data_uri(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// One entry per detector, in [`DetectorKind::ALL`] order.
    pub results: Vec<DetectorResult>,
    /// Authenticity: 100 is genuine, 0 is manipulated.
    pub final_score: f64,
    pub debug_images: DebugImages,
}

impl AnalysisResult {
    pub fn result(&self, kind: DetectorKind) -> Option<&DetectorResult> {
        self.results.iter().find(|r| r.detector == kind)
    }

    pub fn manipulation_score(&self) -> f64 {
        100.0 - self.final_score
    }
}

pub struct ForensicsAnalyzer {
    config: AnalysisConfig,
}

impl ForensicsAnalyzer {
    pub fn new() -> Self {
        Self { config: AnalysisConfig::default() }
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs every detector over `bytes` and aggregates them. Detector
    /// failures surface as Warning results, so this never fails.
    pub fn analyze(&self, bytes: &[u8]) -> AnalysisResult {
        let config = &self.config;

        let metadata = MetadataDetector::new();
        let ela = ElaAnalyzer::new()
            .with_qualities(config.ela_qualities.clone())
            .with_visualizer(config.visualizer());
        let noise = NoiseAnalyzer::new()
            .with_block_size(config.noise_block_size)
            .with_visualizer(config.visualizer());
        let mut ai = AiForensicsDetector::new()
            .with_frequency(FrequencyAnalyzer::new(config.frequency_working_size));
        match CopyMoveDetector::new(
            config.copy_move_working_size,
            config.copy_move_block_size,
            config.copy_move_stride,
        ) {
            Ok(detector) => ai = ai.with_copy_move(detector),
            Err(err) => warn!("invalid copy-move settings, using defaults: {}", err),
        }

        let run = |detector: &dyn Detector| detector.evaluate(bytes);

        let ((meta_out, mut ela_out), (mut noise_out, ai_out)) = if config.parallel {
            rayon::join(
                || rayon::join(|| run(&metadata), || run(&ela)),
                || rayon::join(|| run(&noise), || run(&ai)),
            )
        } else {
            ((run(&metadata), run(&ela)), (run(&noise), run(&ai)))
        };

        let placeholder = || Visualizer::new().placeholder_jpeg();
        let debug_images = DebugImages {
            ela: ela_out.visualization.take().unwrap_or_else(placeholder),
            noise_map: noise_out.visualization.take().unwrap_or_else(placeholder),
        };

        let results = [meta_out, ela_out, noise_out, ai_out]
            .into_iter()
            .map(|out: DetectorOutput| out.result)
            .collect::<Vec<_>>();

        let card = scoring::score(&results, &config.weights, config.consensus_adjustment);
        info!(
            "analysis complete: weighted {:.2}, adjustment {:+}, authenticity {}",
            card.weighted, card.adjustment, card.authenticity
        );

        AnalysisResult {
            results,
            final_score: card.authenticity,
            debug_images,
        }
    }
}

impl Default for ForensicsAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyzes one encoded image with the default configuration.
pub fn analyze(bytes: &[u8]) -> AnalysisResult {
    ForensicsAnalyzer::new().analyze(bytes)
}
