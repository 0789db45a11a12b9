use image::RgbImage;
use log::debug;
use statrs::statistics::Statistics;

use crate::{
    detection::{Detector, DetectorKind, DetectorOutput, DetectorResult, Verdict},
    error::{ForensicsError, Result},
    image_utils::{decode, encode_jpeg, encode_png},
    report::visualization::Visualizer,
};

/// Multi-quality error level analysis. Each pixel is re-compressed at every
/// configured quality; edited regions answer inconsistently, so the variance
/// of the per-quality error is what gets measured.
pub struct ElaAnalyzer {
    qualities: Vec<u8>,
    sigma_factor: f64,
    visualizer: Visualizer,
}

/// Per-pixel variance map and its global statistics.
#[derive(Debug, Clone)]
pub struct ElaVarianceMap {
    pub width: u32,
    pub height: u32,
    pub variance: Vec<f64>,
    pub mean: f64,
    pub std_deviation: f64,
    pub max: f64,
}

impl ElaVarianceMap {
    pub fn threshold(&self, sigma_factor: f64) -> f64 {
        self.mean + sigma_factor * self.std_deviation
    }

    pub fn anomaly_ratio(&self, sigma_factor: f64) -> f64 {
        if self.variance.is_empty() {
            return 0.0;
        }
        let threshold = self.threshold(sigma_factor);
        let anomalous = self.variance.iter().filter(|&&v| v > threshold).count();
        anomalous as f64 / self.variance.len() as f64
    }
}

impl ElaAnalyzer {
    pub fn new() -> Self {
        Self {
            qualities: vec![75, 85, 95],
            sigma_factor: 2.0,
            visualizer: Visualizer::new(),
        }
    }

    pub fn with_qualities(mut self, qualities: Vec<u8>) -> Self {
        self.qualities = qualities;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Visualizer) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Lossless intermediate so earlier compression of the upload does not
    /// leak into the comparison.
    fn normalize(&self, bytes: &[u8]) -> Result<RgbImage> {
        let rgb = decode(bytes)?.to_rgb8();
        let png = encode_png(&rgb)?;
        Ok(decode(&png)?.to_rgb8())
    }

    pub fn variance_map(&self, original: &RgbImage) -> Result<ElaVarianceMap> {
        if self.qualities.is_empty() {
            return Err(ForensicsError::InvalidParameter(
                "ELA needs at least one quality level".into(),
            ));
        }

        let (width, height) = original.dimensions();
        let recompressed = self
            .qualities
            .iter()
            .map(|&q| Ok(decode(&encode_jpeg(original, q)?)?.to_rgb8()))
            .collect::<Result<Vec<_>>>()?;

        if recompressed.iter().any(|r| r.dimensions() != (width, height)) {
            return Err(ForensicsError::AnalysisFailed(
                "re-compressed image changed dimensions".into(),
            ));
        }

        let levels = self.qualities.len() as f64;
        let mut variance = Vec::with_capacity((width * height) as usize);
        let mut diffs = vec![0.0f64; self.qualities.len()];

        for (i, orig) in original.pixels().enumerate() {
            let mut channel_var = 0.0;

            for c in 0..3 {
                for (d, recomp) in diffs.iter_mut().zip(&recompressed) {
                    let other = recomp.as_raw()[i * 3 + c];
                    *d = (orig[c] as f64 - other as f64).abs();
                }
                let mean = diffs.iter().sum::<f64>() / levels;
                channel_var += diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / levels;
            }

            variance.push(channel_var / 3.0);
        }

        let (mean, std_deviation) = if variance.is_empty() {
            (0.0, 0.0)
        } else {
            (variance.iter().mean(), variance.iter().population_std_dev())
        };
        let max = variance.iter().cloned().fold(0.0f64, f64::max);

        Ok(ElaVarianceMap { width, height, variance, mean, std_deviation, max })
    }

    pub fn classify(&self, anomaly_ratio: f64) -> (Verdict, f64) {
        if anomaly_ratio > 0.15 {
            (Verdict::Fail, (anomaly_ratio * 400.0).round().min(100.0))
        } else if anomaly_ratio > 0.05 {
            (Verdict::Warning, (anomaly_ratio * 300.0).round())
        } else {
            (Verdict::Pass, (anomaly_ratio * 100.0).round())
        }
    }

    fn details(&self, verdict: Verdict, ratio: f64, map: &ElaVarianceMap) -> String {
        let percent = ratio * 100.0;
        match verdict {
            Verdict::Fail => format!(
                "ELA detected {:.1}% anomalous pixels across compression levels, a strong manipulation signature. Avg variance: {:.2}, StdDev: {:.2}.",
                percent, map.mean, map.std_deviation
            ),
            Verdict::Warning => format!(
                "ELA detected {:.1}% anomalous pixels, possible light editing or image processing. Avg variance: {:.2}.",
                percent, map.mean
            ),
            Verdict::Pass => format!(
                "ELA shows consistent compression response ({:.1}% anomaly ratio). Image appears unmodified.",
                percent
            ),
        }
    }
}

impl Default for ElaAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for ElaAnalyzer {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ela
    }

    fn fallback_score(&self) -> f64 {
        15.0
    }

    fn fallback_details(&self, error: &str) -> String {
        format!("Could not perform ELA analysis: {}", error)
    }

    fn produces_visualization(&self) -> bool {
        true
    }

    fn detect(&self, bytes: &[u8]) -> Result<DetectorOutput> {
        let original = self.normalize(bytes)?;
        let map = self.variance_map(&original)?;

        let ratio = map.anomaly_ratio(self.sigma_factor);
        let (verdict, score) = self.classify(ratio);
        debug!(
            "ELA: anomaly ratio {:.4}, mean variance {:.3}, std {:.3}",
            ratio, map.mean, map.std_deviation
        );

        let overlay = self.visualizer.ela_overlay(
            &map.variance,
            map.width,
            map.height,
            map.threshold(self.sigma_factor),
            map.max,
        );
        let visualization = self.visualizer.encode(&overlay)?;

        let result = DetectorResult::new(
            DetectorKind::Ela,
            verdict,
            score,
            self.details(verdict, ratio, &map),
        );

        Ok(DetectorOutput::with_visualization(result, visualization))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_ela_analyzer_creation() {
        let analyzer = ElaAnalyzer::new();
        assert_eq!(analyzer.qualities, vec![75, 85, 95]);
    }

    #[test]
    fn test_classification_thresholds() {
        let analyzer = ElaAnalyzer::new();
        assert_eq!(analyzer.classify(0.0), (Verdict::Pass, 0.0));
        assert_eq!(analyzer.classify(0.05), (Verdict::Pass, 5.0));
        assert_eq!(analyzer.classify(0.10), (Verdict::Warning, 30.0));
        assert_eq!(analyzer.classify(0.20), (Verdict::Fail, 80.0));
        assert_eq!(analyzer.classify(0.60), (Verdict::Fail, 100.0));
    }

    #[test]
    fn test_classification_is_monotonic() {
        let analyzer = ElaAnalyzer::new();
        let mut last = (Verdict::Pass, 0.0);
        for step in 0..=100 {
            let current = analyzer.classify(step as f64 / 100.0);
            assert!(current.0 >= last.0);
            assert!(current.1 >= last.1);
            last = current;
        }
    }

    #[test]
    fn test_anomaly_ratio() {
        let map = ElaVarianceMap {
            width: 4,
            height: 1,
            variance: vec![0.0, 0.0, 0.0, 8.0],
            mean: 2.0,
            std_deviation: 12f64.sqrt(),
            max: 8.0,
        };
        // threshold = 2 + 2*3.46 = 8.93, nothing above it
        assert_eq!(map.anomaly_ratio(2.0), 0.0);
        assert_eq!(map.anomaly_ratio(1.0), 0.25);
    }

    #[test]
    fn test_neutral_gray_has_no_error_variance() {
        let image = RgbImage::from_pixel(32, 32, Rgb([128, 128, 128]));
        let map = ElaAnalyzer::new().variance_map(&image).unwrap();

        assert_eq!(map.variance.len(), 32 * 32);
        assert_eq!(map.max, 0.0);
        assert_eq!(map.anomaly_ratio(2.0), 0.0);
    }

    #[test]
    fn test_corrupt_input_degrades() {
        let output = ElaAnalyzer::new().evaluate(&[0xFF, 0xD8, 0xFF, 0x00, 0x01]);
        assert_eq!(output.result.verdict, Verdict::Warning);
        assert_eq!(output.result.score, 15.0);
        assert!(output.visualization.is_some_and(|v| !v.is_empty()));
    }
}
