use std::collections::BTreeMap;

use image::{DynamicImage, GrayImage};
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    BlockRegion,
    error::{ForensicsError, Result},
    image_utils::{block_mean, block_variance, extract_block, gray_working_copy},
};

/// Groups larger than this are repetitive texture (sky, walls), not a
/// transplanted region.
const MAX_GROUP: usize = 9;
const SATURATION_MATCHES: f64 = 30.0;
const MEAN_STEPS: f64 = 16.0;
const GRADIENT_STEP: u32 = 2;

pub struct CopyMoveDetector {
    working_size: u32,
    block_size: u32,
    stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct BlockKey {
    mean: u32,
    variance: u32,
    gradient: u32,
}

#[derive(Debug, Clone, Copy)]
struct BlockFeature {
    x: u32,
    y: u32,
    key: BlockKey,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPair {
    pub source: BlockRegion,
    pub target: BlockRegion,
    pub distance: f64,
}

#[derive(Debug, Clone)]
pub struct CopyMoveResult {
    pub matches: Vec<MatchPair>,
    pub score: f64,
}

impl CopyMoveDetector {
    pub fn new(working_size: u32, block_size: u32, stride: u32) -> Result<Self> {
        if block_size < 4 || block_size > 64 {
            return Err(ForensicsError::InvalidParameter(
                "Block size must be between 4 and 64".into(),
            ));
        }
        if stride == 0 {
            return Err(ForensicsError::InvalidParameter("Stride must be positive".into()));
        }
        if working_size < block_size * 2 {
            return Err(ForensicsError::ImageTooSmall(block_size * 2));
        }

        Ok(Self { working_size, block_size, stride })
    }

    pub fn detect(&self, image: &DynamicImage) -> CopyMoveResult {
        let gray = gray_working_copy(image, self.working_size);
        self.detect_gray(&gray)
    }

    pub fn detect_gray(&self, gray: &GrayImage) -> CopyMoveResult {
        let features = self.extract_features(gray);
        let matches = self.find_matches(&features);
        let score = (matches.len() as f64 / SATURATION_MATCHES * 100.0).min(100.0);

        CopyMoveResult { matches, score }
    }

    fn extract_features(&self, gray: &GrayImage) -> Vec<BlockFeature> {
        let (width, height) = gray.dimensions();
        if width <= self.block_size || height <= self.block_size {
            return Vec::new();
        }

        let mut positions = Vec::new();
        for y in (0..height - self.block_size).step_by(self.stride as usize) {
            for x in (0..width - self.block_size).step_by(self.stride as usize) {
                positions.push((x, y));
            }
        }

        positions
            .par_iter()
            .map(|&(x, y)| BlockFeature { x, y, key: self.block_key(gray, x, y) })
            .collect()
    }

    /// Discretized (mean, variance, horizontal gradient) signature of a block.
    /// Mean is kept to 1/16 of a gray level, variance to whole units and the
    /// gradient sum to steps of 2, so smooth regions that only share a mean
    /// land in different buckets while duplicated pixels still collide.
    fn block_key(&self, gray: &GrayImage, x: u32, y: u32) -> BlockKey {
        let block = extract_block(gray, x, y, self.block_size);

        let n = self.block_size as usize;
        let gradient = block
            .chunks(n)
            .flat_map(|row| row.windows(2).map(|w| (w[1] as i32 - w[0] as i32).unsigned_abs()))
            .sum::<u32>();

        BlockKey {
            mean: (block_mean(&block) * MEAN_STEPS) as u32,
            variance: block_variance(&block) as u32,
            gradient: gradient / GRADIENT_STEP,
        }
    }

    fn find_matches(&self, features: &[BlockFeature]) -> Vec<MatchPair> {
        let mut groups: BTreeMap<BlockKey, Vec<&BlockFeature>> = BTreeMap::new();
        for feature in features {
            groups.entry(feature.key).or_default().push(feature);
        }

        let min_distance = 3.0 * self.block_size as f64;
        let mut matches = Vec::new();

        for members in groups.values() {
            if members.len() < 2 || members.len() > MAX_GROUP {
                continue;
            }

            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    let dx = a.x as f64 - b.x as f64;
                    let dy = a.y as f64 - b.y as f64;
                    let distance = (dx * dx + dy * dy).sqrt();

                    if distance > min_distance {
                        matches.push(MatchPair {
                            source: self.region(a),
                            target: self.region(b),
                            distance,
                        });
                    }
                }
            }
        }

        matches
    }

    fn region(&self, feature: &BlockFeature) -> BlockRegion {
        BlockRegion {
            x: feature.x,
            y: feature.y,
            width: self.block_size,
            height: self.block_size,
        }
    }
}

impl Default for CopyMoveDetector {
    fn default() -> Self {
        Self { working_size: 256, block_size: 16, stride: 8 }
    }
}
