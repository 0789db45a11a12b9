//! Weighted aggregation of detector scores into one verdict.

use serde::{Deserialize, Serialize};

use crate::detection::{DetectorKind, DetectorResult, Verdict};

/// Detectors that must agree before the consensus nudge applies.
const CONSENSUS_QUORUM: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorWeights {
    pub metadata: f64,
    pub ela: f64,
    pub noise_variance: f64,
    pub ai_forensics: f64,
}

impl Default for DetectorWeights {
    fn default() -> Self {
        Self {
            metadata: 0.15,
            ela: 0.30,
            noise_variance: 0.25,
            ai_forensics: 0.30,
        }
    }
}

impl DetectorWeights {
    pub fn weight(&self, kind: DetectorKind) -> f64 {
        match kind {
            DetectorKind::Metadata => self.metadata,
            DetectorKind::Ela => self.ela,
            DetectorKind::NoiseVariance => self.noise_variance,
            DetectorKind::AiForensics => self.ai_forensics,
        }
    }

    pub fn sum(&self) -> f64 {
        self.metadata + self.ela + self.noise_variance + self.ai_forensics
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreCard {
    pub weighted: f64,
    pub adjustment: f64,
    /// `round(clamp(weighted + adjustment, 0, 100))`
    pub manipulation: f64,
    /// `100 - manipulation`
    pub authenticity: f64,
}

pub fn weighted_score(results: &[DetectorResult], weights: &DetectorWeights) -> f64 {
    results
        .iter()
        .map(|r| r.score * weights.weight(r.detector))
        .sum()
}

/// `+magnitude` when a quorum fails, `-magnitude` when a quorum passes.
pub fn consensus_adjustment(results: &[DetectorResult], magnitude: f64) -> f64 {
    let count = |verdict: Verdict| results.iter().filter(|r| r.verdict == verdict).count();

    if count(Verdict::Fail) >= CONSENSUS_QUORUM {
        magnitude
    } else if count(Verdict::Pass) >= CONSENSUS_QUORUM {
        -magnitude
    } else {
        0.0
    }
}

pub fn score(results: &[DetectorResult], weights: &DetectorWeights, magnitude: f64) -> ScoreCard {
    let weighted = weighted_score(results, weights);
    let adjustment = consensus_adjustment(results, magnitude);
    let manipulation = (weighted + adjustment).clamp(0.0, 100.0).round();

    ScoreCard {
        weighted,
        adjustment,
        manipulation,
        authenticity: 100.0 - manipulation,
    }
}
