pub mod visualization;

use serde::Serialize;

use crate::{AnalysisResult, detection::DetectorResult};

/// Wire form of an [`AnalysisResult`].
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonReport {
    pub results: Vec<DetectorResult>,
    pub final_score: f64,
    pub debug_images: DebugImagesSection,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugImagesSection {
    pub ela: String,
    pub noise_map: String,
}

impl From<&AnalysisResult> for JsonReport {
    fn from(analysis: &AnalysisResult) -> Self {
        Self {
            results: analysis.results.clone(),
            final_score: analysis.final_score,
            debug_images: DebugImagesSection {
                ela: analysis.debug_images.ela_data_uri(),
                noise_map: analysis.debug_images.noise_map_data_uri(),
            },
        }
    }
}

impl JsonReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
