use crate::config::DetectorConfig;
use crate::detect::WindowStats;

/// Scoring outcome for a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointScore {
    pub z_rps: f64,
    pub z_bps: f64,
    /// `max(|z_rps|, |z_bps|)`
    pub score: f64,
    pub hard_hit: bool,
    pub is_candidate: bool,
}

/// Fuses the relative (z-score) and absolute (hard threshold) signals.
///
/// Either signal alone is enough to raise a candidate: the hard thresholds
/// still fire when the trailing baseline has already drifted up to the
/// attack level and the z-scores have gone flat.
#[derive(Debug, Clone, Copy)]
pub struct PointScorer {
    z_threshold: f64,
    rps_hard_threshold: f64,
    bps_hard_threshold: f64,
}

impl PointScorer {
    pub fn new(z_threshold: f64, rps_hard_threshold: f64, bps_hard_threshold: f64) -> Self {
        Self {
            z_threshold,
            rps_hard_threshold,
            bps_hard_threshold,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.z_threshold,
            config.rps_hard_threshold,
            config.bps_hard_threshold,
        )
    }

    pub fn score(&self, rps: f64, bps: f64, rps_stats: WindowStats, bps_stats: WindowStats) -> PointScore {
        let z_rps = z_score(rps, rps_stats);
        let z_bps = z_score(bps, bps_stats);
        let score = z_rps.abs().max(z_bps.abs());
        let hard_hit = rps >= self.rps_hard_threshold || bps >= self.bps_hard_threshold;

        PointScore {
            z_rps,
            z_bps,
            score,
            hard_hit,
            is_candidate: hard_hit || score >= self.z_threshold,
        }
    }
}

/// Z = (value - mean) / std_dev, or exactly 0.0 for a zero-variance window.
fn z_score(value: f64, stats: WindowStats) -> f64 {
    if stats.std_dev == 0.0 {
        return 0.0;
    }
    (value - stats.mean) / stats.std_dev
}
