use image::{GrayImage, Luma};
use log::debug;
use ndarray::Array2;

use crate::{
    BlockRegion,
    detection::{Detector, DetectorKind, DetectorOutput, DetectorResult, Verdict},
    error::Result,
    image_utils::{block_variance, decode, extract_block, rgb_to_gray},
    report::visualization::Visualizer,
};

const MIN_BLOCKS: usize = 4;
const TOO_SMALL_SCORE: f64 = 10.0;

/// Noise-residual consistency check. Blocks whose residual variance falls
/// outside the image's own IQR fence are treated as foreign material.
pub struct NoiseAnalyzer {
    block_size: u32,
    iqr_factor: f64,
    discontinuity_factor: f64,
    visualizer: Visualizer,
}

/// Outlier statistics over the grid of block variances.
#[derive(Debug, Clone)]
pub struct BlockAnalysis {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    /// `(row, col)` of every block outside the fence.
    pub anomalous: Vec<(usize, usize)>,
    pub discontinuities: usize,
    pub total_blocks: usize,
}

impl BlockAnalysis {
    pub fn anomaly_ratio(&self) -> f64 {
        self.anomalous.len() as f64 / self.total_blocks as f64
    }

    pub fn discontinuity_ratio(&self) -> f64 {
        self.discontinuities as f64 / (self.total_blocks * 2) as f64
    }
}

impl NoiseAnalyzer {
    pub fn new() -> Self {
        Self {
            block_size: 32,
            iqr_factor: 1.5,
            discontinuity_factor: 0.8,
            visualizer: Visualizer::new(),
        }
    }

    pub fn with_block_size(mut self, size: u32) -> Self {
        self.block_size = size;
        self
    }

    pub fn with_visualizer(mut self, visualizer: Visualizer) -> Self {
        self.visualizer = visualizer;
        self
    }

    /// Absolute 4-neighbour Laplacian, clamped to `0..=255`. The one pixel
    /// border has no full neighbourhood and stays zero.
    pub fn laplacian_residual(&self, gray: &GrayImage) -> GrayImage {
        let (width, height) = gray.dimensions();
        let mut residual = GrayImage::new(width, height);

        if width < 3 || height < 3 {
            return residual;
        }

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let center = gray.get_pixel(x, y)[0] as i32;
                let neighbours = gray.get_pixel(x, y - 1)[0] as i32
                    + gray.get_pixel(x, y + 1)[0] as i32
                    + gray.get_pixel(x - 1, y)[0] as i32
                    + gray.get_pixel(x + 1, y)[0] as i32;
                let lap = (4 * center - neighbours).abs().min(255) as u8;
                residual.put_pixel(x, y, Luma([lap]));
            }
        }

        residual
    }

    /// Variance of every non-overlapping block, laid out as the block grid.
    /// A block starts only where `start < side - block_size`, so the last
    /// tile along a side that is an exact multiple of the block size is skipped.
    pub fn block_variances(&self, residual: &GrayImage) -> Array2<f64> {
        let rows = grid_len(residual.height(), self.block_size);
        let cols = grid_len(residual.width(), self.block_size);

        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let block = extract_block(
                residual,
                c as u32 * self.block_size,
                r as u32 * self.block_size,
                self.block_size,
            );
            block_variance(&block)
        })
    }

    pub fn analyze_blocks(&self, grid: &Array2<f64>) -> BlockAnalysis {
        let mut sorted = grid.iter().cloned().collect::<Vec<_>>();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let (q1, q3) = quartiles(&sorted);

        let iqr = q3 - q1;
        let lower_bound = q1 - self.iqr_factor * iqr;
        let upper_bound = q3 + self.iqr_factor * iqr;

        let anomalous = grid
            .indexed_iter()
            .filter(|&(_, &v)| v < lower_bound || v > upper_bound)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        let jump = upper_bound * self.discontinuity_factor;
        let (rows, cols) = grid.dim();
        let mut discontinuities = 0;

        for ((r, c), &v) in grid.indexed_iter() {
            if c + 1 < cols && (v - grid[[r, c + 1]]).abs() > jump {
                discontinuities += 1;
            }
            if r + 1 < rows && (v - grid[[r + 1, c]]).abs() > jump {
                discontinuities += 1;
            }
        }

        BlockAnalysis {
            q1,
            q3,
            iqr,
            lower_bound,
            upper_bound,
            anomalous,
            discontinuities,
            total_blocks: grid.len(),
        }
    }

    pub fn classify(&self, anomaly_ratio: f64, discontinuity_ratio: f64) -> (Verdict, f64) {
        let score = ((anomaly_ratio * 60.0 + discontinuity_ratio * 40.0) * 100.0)
            .round()
            .min(100.0);

        let verdict = if anomaly_ratio > 0.20 || discontinuity_ratio > 0.15 {
            Verdict::Fail
        } else if anomaly_ratio > 0.08 || discontinuity_ratio > 0.05 {
            Verdict::Warning
        } else {
            Verdict::Pass
        };

        (verdict, score)
    }

    fn details(&self, verdict: Verdict, analysis: &BlockAnalysis) -> String {
        let anomalous = analysis.anomalous.len();
        let total = analysis.total_blocks;
        let percent = analysis.anomaly_ratio() * 100.0;

        match verdict {
            Verdict::Fail => format!(
                "Found {}/{} anomalous noise blocks ({:.1}%) with {} sharp discontinuities, a strong splicing indicator.",
                anomalous, total, percent, analysis.discontinuities
            ),
            Verdict::Warning => format!(
                "Found {}/{} mildly anomalous blocks ({:.1}%), possible light editing or different source regions.",
                anomalous, total, percent
            ),
            Verdict::Pass => format!(
                "Noise profile is consistent across all {} analyzed blocks. IQR: {:.1}, no significant discontinuities.",
                total, analysis.iqr
            ),
        }
    }

    fn region(&self, (row, col): (usize, usize)) -> BlockRegion {
        BlockRegion {
            x: col as u32 * self.block_size,
            y: row as u32 * self.block_size,
            width: self.block_size,
            height: self.block_size,
        }
    }
}

/// Number of block starts `0, bs, 2bs, ..` strictly below `side - bs`.
fn grid_len(side: u32, block_size: u32) -> usize {
    if side <= block_size {
        return 0;
    }
    ((side - 1) / block_size) as usize
}

/// `Q1 = sorted[⌊n/4⌋]`, `Q3 = sorted[⌊3n/4⌋]` on an ascending slice.
pub fn quartiles(sorted: &[f64]) -> (f64, f64) {
    if sorted.is_empty() {
        return (0.0, 0.0);
    }
    let n = sorted.len() as f64;
    let q1 = sorted[(n * 0.25).floor() as usize];
    let q3 = sorted[((n * 0.75).floor() as usize).min(sorted.len() - 1)];
    (q1, q3)
}

impl Default for NoiseAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for NoiseAnalyzer {
    fn kind(&self) -> DetectorKind {
        DetectorKind::NoiseVariance
    }

    fn fallback_score(&self) -> f64 {
        10.0
    }

    fn fallback_details(&self, error: &str) -> String {
        format!("Noise analysis failed: {}", error)
    }

    fn produces_visualization(&self) -> bool {
        true
    }

    fn detect(&self, bytes: &[u8]) -> Result<DetectorOutput> {
        let gray = rgb_to_gray(&decode(bytes)?.to_rgb8());
        let residual = self.laplacian_residual(&gray);
        let grid = self.block_variances(&residual);

        if grid.len() < MIN_BLOCKS {
            debug!("noise: only {} blocks, image too small", grid.len());
            let result = DetectorResult::warning(
                DetectorKind::NoiseVariance,
                TOO_SMALL_SCORE,
                "Image is too small for block noise analysis.",
            );
            return Ok(DetectorOutput::with_visualization(result, self.visualizer.placeholder_jpeg()));
        }

        let analysis = self.analyze_blocks(&grid);
        let (verdict, score) = self.classify(analysis.anomaly_ratio(), analysis.discontinuity_ratio());
        debug!(
            "noise: {}/{} anomalous blocks, {} discontinuities, bounds [{:.2}, {:.2}]",
            analysis.anomalous.len(),
            analysis.total_blocks,
            analysis.discontinuities,
            analysis.lower_bound,
            analysis.upper_bound
        );

        let regions = analysis
            .anomalous
            .iter()
            .map(|&idx| self.region(idx))
            .collect::<Vec<_>>();
        let overlay = self.visualizer.noise_overlay(&residual, &regions);
        let visualization = self.visualizer.encode(&overlay)?;

        let result = DetectorResult::new(
            DetectorKind::NoiseVariance,
            verdict,
            score,
            self.details(verdict, &analysis),
        );

        Ok(DetectorOutput::with_visualization(result, visualization))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::encode_png;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_laplacian_of_flat_image_is_zero() {
        let gray = GrayImage::from_pixel(8, 8, Luma([90]));
        let residual = NoiseAnalyzer::new().laplacian_residual(&gray);
        assert!(residual.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_laplacian_of_point() {
        let mut gray = GrayImage::new(5, 5);
        gray.put_pixel(2, 2, Luma([40]));
        let residual = NoiseAnalyzer::new().laplacian_residual(&gray);

        assert_eq!(residual.get_pixel(2, 2)[0], 160);
        assert_eq!(residual.get_pixel(2, 1)[0], 40);
        assert_eq!(residual.get_pixel(1, 1)[0], 0);
    }

    #[test]
    fn test_quartiles() {
        let sorted = (0..8).map(|v| v as f64).collect::<Vec<_>>();
        assert_eq!(quartiles(&sorted), (2.0, 6.0));
        assert_eq!(quartiles(&[5.0]), (5.0, 5.0));
    }

    #[test]
    fn test_block_grid_bounds() {
        let analyzer = NoiseAnalyzer::new();
        let grid = |w, h| analyzer.block_variances(&GrayImage::new(w, h)).dim();

        assert_eq!(grid(100, 70), (2, 3));
        assert_eq!(grid(64, 64), (1, 1));
        assert_eq!(grid(256, 256), (7, 7));
        assert_eq!(grid(257, 33), (1, 8));
        assert_eq!(grid(32, 32), (0, 0));
    }

    #[test]
    fn test_exact_multiple_side_falls_back() {
        let png = encode_png(&RgbImage::from_pixel(64, 64, Rgb([60, 70, 80]))).unwrap();
        let output = NoiseAnalyzer::new().evaluate(&png);

        assert_eq!(output.result.verdict, Verdict::Warning);
        assert_eq!(output.result.score, 10.0);
        assert_eq!(output.visualization, Some(Visualizer::new().placeholder_jpeg()));
    }

    #[test]
    fn test_uniform_grid_passes() {
        let analyzer = NoiseAnalyzer::new();
        let grid = Array2::from_elem((4, 4), 12.0);
        let analysis = analyzer.analyze_blocks(&grid);

        assert!(analysis.anomalous.is_empty());
        assert_eq!(analysis.discontinuities, 0);
        assert_eq!(analyzer.classify(analysis.anomaly_ratio(), analysis.discontinuity_ratio()), (Verdict::Pass, 0.0));
    }

    #[test]
    fn test_single_outlier_block() {
        let analyzer = NoiseAnalyzer::new();
        let mut grid = Array2::from_elem((4, 4), 10.0);
        grid[[1, 1]] = 100.0;

        let analysis = analyzer.analyze_blocks(&grid);
        assert_eq!(analysis.anomalous, vec![(1, 1)]);
        assert_eq!(analysis.upper_bound, 10.0);
        assert_eq!(analysis.discontinuities, 4);
        assert_eq!(analysis.anomaly_ratio(), 1.0 / 16.0);
        assert_eq!(analysis.discontinuity_ratio(), 4.0 / 32.0);

        let (verdict, score) = analyzer.classify(analysis.anomaly_ratio(), analysis.discontinuity_ratio());
        assert_eq!(verdict, Verdict::Warning);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_classification_thresholds() {
        let analyzer = NoiseAnalyzer::new();
        assert_eq!(analyzer.classify(0.0, 0.0).0, Verdict::Pass);
        assert_eq!(analyzer.classify(0.09, 0.0).0, Verdict::Warning);
        assert_eq!(analyzer.classify(0.0, 0.06).0, Verdict::Warning);
        assert_eq!(analyzer.classify(0.21, 0.0).0, Verdict::Fail);
        assert_eq!(analyzer.classify(0.0, 0.16).0, Verdict::Fail);
        assert_eq!(analyzer.classify(0.001, 0.0).1, 6.0);
    }

    #[test]
    fn test_too_small_image() {
        let png = encode_png(&RgbImage::from_pixel(48, 48, Rgb([60, 70, 80]))).unwrap();
        let output = NoiseAnalyzer::new().evaluate(&png);

        assert_eq!(output.result.verdict, Verdict::Warning);
        assert_eq!(output.result.score, 10.0);
        assert!(output.result.details.contains("too small"));
    }

    #[test]
    fn test_spliced_noise_region_is_flagged() {
        let mut rgb = RgbImage::from_pixel(128, 128, Rgb([100, 100, 100]));
        let mut state = 12345u32;
        for y in 32..64 {
            for x in 32..64 {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let v = 40 + ((state >> 16) % 161) as u8;
                rgb.put_pixel(x, y, Rgb([v, v, v]));
            }
        }
        let png = encode_png(&rgb).unwrap();

        let output = NoiseAnalyzer::new().evaluate(&png);
        assert!(output.result.verdict >= Verdict::Warning);
        assert_eq!(output.result.score, 100.0);

        let overlay = image::load_from_memory(&output.visualization.unwrap()).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (128, 128));
    }
}
