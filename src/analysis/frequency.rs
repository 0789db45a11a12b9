use image::{DynamicImage, GrayImage};

use crate::image_utils::gray_working_copy;

/// Share of high-frequency pixels on a small grayscale copy. Camera photos
/// sit in a middle band; synthetic or heavily smoothed images fall outside.
pub struct FrequencyAnalyzer {
    working_size: u32,
    gradient_threshold: u32,
}

impl FrequencyAnalyzer {
    pub fn new(working_size: u32) -> Self {
        Self { working_size, gradient_threshold: 25 }
    }

    pub fn analyze(&self, image: &DynamicImage) -> f64 {
        let gray = gray_working_copy(image, self.working_size);
        self.score(self.high_low_ratio(&gray))
    }

    /// `high / (low + 1)` over interior pixels, where a pixel is high
    /// frequency when its 4-neighbour absolute gradient sum exceeds the threshold.
    pub fn high_low_ratio(&self, gray: &GrayImage) -> f64 {
        let (width, height) = gray.dimensions();
        if width < 3 || height < 3 {
            return 0.0;
        }

        let mut high = 0u64;
        let mut low = 0u64;

        for y in 1..height - 1 {
            for x in 1..width - 1 {
                let c = gray.get_pixel(x, y)[0] as i32;
                let gradient = [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
                    .iter()
                    .map(|&(nx, ny)| (c - gray.get_pixel(nx, ny)[0] as i32).unsigned_abs())
                    .sum::<u32>();

                if gradient > self.gradient_threshold {
                    high += 1;
                } else {
                    low += 1;
                }
            }
        }

        high as f64 / (low + 1) as f64
    }

    pub fn score(&self, ratio: f64) -> f64 {
        if ratio > 0.7 || ratio < 0.02 {
            65.0
        } else if ratio > 0.55 || ratio < 0.04 {
            35.0
        } else {
            5.0
        }
    }
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new(128)
    }
}
