use image::{GrayImage, Rgb, RgbImage};
use log::warn;

use crate::{BlockRegion, error::Result, image_utils::encode_jpeg};

#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    pub jpeg_quality: u8,
    pub placeholder_size: u32,
    pub placeholder_color: [u8; 3],
    /// Brightness gain applied to the normalized ELA variance.
    pub ela_gain: f64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 90,
            placeholder_size: 100,
            placeholder_color: [20, 20, 30],
            ela_gain: 3.0,
        }
    }
}

pub struct Visualizer {
    config: VisualizationConfig,
}

impl Visualizer {
    pub fn new() -> Self {
        Self { config: VisualizationConfig::default() }
    }

    pub fn with_config(config: VisualizationConfig) -> Self {
        Self { config }
    }

    /// Brightness follows the per-pixel ELA variance, scaled so the maximum
    /// variance saturates. Anomalous pixels are drawn pure red.
    pub fn ela_overlay(
        &self,
        variance: &[f64],
        width: u32,
        height: u32,
        threshold: f64,
        max_variance: f64,
    ) -> RgbImage {
        let scale = if max_variance > 0.0 { 255.0 / max_variance } else { 1.0 };
        let mut vis = RgbImage::new(width, height);

        for (pixel, &v) in vis.pixels_mut().zip(variance.iter()) {
            let bright = (v * scale * self.config.ela_gain).round().min(255.0) as u8;
            *pixel = if v > threshold {
                Rgb([bright.saturating_mul(2), 0, 0])
            } else {
                Rgb([bright, bright, bright / 2])
            };
        }

        vis
    }

    /// Grayscale residual map with anomalous blocks pushed towards red.
    pub fn noise_overlay(&self, residual: &GrayImage, anomalous: &[BlockRegion]) -> RgbImage {
        let mut vis: RgbImage = imageproc::map::map_colors(residual, |p| Rgb([p[0], p[0], p[0]]));
        let (width, height) = vis.dimensions();

        for region in anomalous {
            for y in region.y..(region.y + region.height).min(height) {
                for x in region.x..(region.x + region.width).min(width) {
                    let v = residual.get_pixel(x, y)[0];
                    let boosted = (v as u16 * 2 + 80).min(255) as u8;
                    let dimmed = v.saturating_sub(20);
                    vis.put_pixel(x, y, Rgb([boosted, dimmed, dimmed]));
                }
            }
        }

        vis
    }

    pub fn placeholder(&self) -> RgbImage {
        let size = self.config.placeholder_size;
        RgbImage::from_pixel(size, size, Rgb(self.config.placeholder_color))
    }

    pub fn encode(&self, image: &RgbImage) -> Result<Vec<u8>> {
        encode_jpeg(image, self.config.jpeg_quality)
    }

    /// Dark placeholder shown when a detector could not draw its overlay.
    pub fn placeholder_jpeg(&self) -> Vec<u8> {
        match self.encode(&self.placeholder()) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("failed to encode placeholder visualization: {}", err);
                Vec::new()
            }
        }
    }
}

impl Default for Visualizer {
    fn default() -> Self {
        Self::new()
    }
}
