use image::{DynamicImage, GrayImage};

use crate::image_utils::rgb_to_gray;

const JPEG_BLOCK: u32 = 8;

/// Strength of 8×8 block boundaries. Repeated JPEG saves leave visible
/// steps on the DCT grid.
pub struct JpegAnalyzer {
    block_size: u32,
}

impl JpegAnalyzer {
    pub fn new() -> Self {
        Self { block_size: JPEG_BLOCK }
    }

    pub fn analyze(&self, image: &DynamicImage) -> f64 {
        let gray = rgb_to_gray(&image.to_rgb8());
        self.score(self.blocking_strength(&gray))
    }

    /// Absolute step across the right and bottom boundary of every interior
    /// block, normalized per boundary pixel and averaged over the full
    /// `(width / 8) * (height / 8)` grid.
    pub fn blocking_strength(&self, gray: &GrayImage) -> f64 {
        let (width, height) = gray.dimensions();
        let bs = self.block_size;
        if width <= bs || height <= bs {
            return 0.0;
        }

        let mut total = 0.0;

        for y in (0..height - bs).step_by(bs as usize) {
            for x in (0..width - bs).step_by(bs as usize) {
                let mut vertical_edge = 0.0;
                let mut horizontal_edge = 0.0;

                for i in 0..bs {
                    let left = gray.get_pixel(x + bs - 1, y + i)[0] as f64;
                    let right = gray.get_pixel(x + bs, y + i)[0] as f64;
                    vertical_edge += (right - left).abs();

                    let top = gray.get_pixel(x + i, y + bs - 1)[0] as f64;
                    let bottom = gray.get_pixel(x + i, y + bs)[0] as f64;
                    horizontal_edge += (bottom - top).abs();
                }

                total += (vertical_edge + horizontal_edge) / (bs * 2) as f64;
            }
        }

        let grid = (width as f64 / bs as f64) * (height as f64 / bs as f64);
        total / grid
    }

    pub fn score(&self, strength: f64) -> f64 {
        if strength > 25.0 {
            70.0
        } else if strength > 18.0 {
            45.0
        } else if strength > 10.0 {
            20.0
        } else if strength > 5.0 {
            10.0
        } else {
            0.0
        }
    }
}

impl Default for JpegAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
