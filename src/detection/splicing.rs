use std::f64::consts::FRAC_PI_4;

use image::{GrayImage, RgbImage};

use crate::image_utils::rgb_to_gray;

#[derive(Debug, Clone)]
pub struct SplicingConfig {
    pub histogram_bins: usize,
    pub texture_step: u32,
    pub texture_radius: u32,
    pub chi_normalizer: f64,
    pub texture_normalizer: f64,
    pub max_score: f64,
}

impl Default for SplicingConfig {
    fn default() -> Self {
        Self {
            histogram_bins: 32,
            texture_step: 15,
            texture_radius: 2,
            chi_normalizer: 500.0,
            texture_normalizer: 5000.0,
            max_score: 80.0,
        }
    }
}

/// Global color and texture statistics used as a weak splicing signal.
pub struct SplicingDetector {
    config: SplicingConfig,
}

impl SplicingDetector {
    pub fn new() -> Self {
        Self { config: SplicingConfig::default() }
    }

    pub fn analyze(&self, image: &RgbImage) -> f64 {
        let histogram = self.color_histogram(image);
        let codes = self.texture_codes(&rgb_to_gray(image));
        self.score(self.chi_square_uniform(&histogram), variance(&codes))
    }

    pub fn score(&self, chi_square: f64, texture_variance: f64) -> f64 {
        let chi_norm = (chi_square / self.config.chi_normalizer).min(1.0);
        let texture_norm = (texture_variance / self.config.texture_normalizer).min(1.0);
        (chi_norm * 40.0 + texture_norm * 60.0).min(self.config.max_score)
    }

    /// Per-channel histogram, each channel normalized to sum to 100. Value
    /// `v` falls in bin `floor(v * (bins - 1) / 255)`, so only 255 reaches
    /// the last bin.
    pub fn color_histogram(&self, image: &RgbImage) -> Vec<f64> {
        let bins = self.config.histogram_bins;
        let mut histogram = vec![0.0; bins * 3];

        for pixel in image.pixels() {
            for c in 0..3 {
                let bin = pixel[c] as usize * (bins - 1) / 255;
                histogram[c * bins + bin] += 1.0;
            }
        }

        let pixels = (image.width() * image.height()) as f64;
        if pixels > 0.0 {
            for count in histogram.iter_mut() {
                *count = *count * 100.0 / pixels;
            }
        }

        histogram
    }

    /// Chi-square distance of each channel's histogram from a flat one.
    pub fn chi_square_uniform(&self, histogram: &[f64]) -> f64 {
        let bins = self.config.histogram_bins;
        let expected = 100.0 / bins as f64;

        histogram
            .chunks(bins)
            .filter(|channel| channel.iter().sum::<f64>() > 0.0)
            .flat_map(|channel| channel.iter())
            .map(|&observed| (observed - expected).powi(2) / expected)
            .sum()
    }

    /// Sparse 8-neighbour local binary pattern codes on a circle of the
    /// configured radius.
    pub fn texture_codes(&self, gray: &GrayImage) -> Vec<u8> {
        let (width, height) = gray.dimensions();
        let radius = self.config.texture_radius;
        if width <= radius * 2 || height <= radius * 2 {
            return Vec::new();
        }

        let offsets = (0..8)
            .map(|i| {
                let angle = i as f64 * FRAC_PI_4;
                let r = radius as f64;
                ((r * angle.cos()).round() as i64, (r * angle.sin()).round() as i64)
            })
            .collect::<Vec<_>>();

        let step = self.config.texture_step.max(1) as usize;
        let mut codes = Vec::new();

        for y in (radius..height - radius).step_by(step) {
            for x in (radius..width - radius).step_by(step) {
                let center = gray.get_pixel(x, y)[0];
                let mut pattern = 0u8;

                for (bit, &(dx, dy)) in offsets.iter().enumerate() {
                    let nx = (x as i64 + dx) as u32;
                    let ny = (y as i64 + dy) as u32;
                    if gray.get_pixel(nx, ny)[0] >= center {
                        pattern |= 1 << bit;
                    }
                }

                codes.push(pattern);
            }
        }

        codes
    }
}

impl Default for SplicingDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn variance(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    values.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n
}
