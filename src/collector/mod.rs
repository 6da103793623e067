//! Synthetic per-second traffic producer.
//!
//! Emits aggregate samples with occasional attack bursts so the detector has
//! something to chew on without a live capture.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, NormalError, StandardNormal};
use serde::{Deserialize, Serialize};

use crate::detect::MetricPoint;

/// Number of top talkers reported per sample.
pub const TOP_SOURCES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficLabel {
    Normal,
    Attack,
}

/// Request count attributed to one source address within a second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub src_ip: String,
    pub req: i64,
}

/// One second of aggregate traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficSample {
    pub ts: i64,
    pub rps: i64,
    pub bps: i64,
    pub unique_src: i64,
    pub syn_ratio: f64,
    pub label: TrafficLabel,
    /// Top sources by request count, descending.
    pub sources: Vec<SourceCount>,
}

impl TrafficSample {
    pub fn point(&self) -> MetricPoint {
        MetricPoint::new(self.ts, self.rps as f64, self.bps as f64)
    }
}

/// Per-metric distributions for one traffic regime.
#[derive(Debug, Clone, Copy)]
struct Profile {
    rps: Normal<f64>,
    bps: Normal<f64>,
    unique_src: Normal<f64>,
    syn_ratio: Normal<f64>,
}

impl Profile {
    fn normal() -> Result<Self, NormalError> {
        Ok(Self {
            rps: Normal::new(420.0, 60.0)?,
            bps: Normal::new(28_000_000.0, 5_000_000.0)?,
            unique_src: Normal::new(220.0, 40.0)?,
            syn_ratio: Normal::new(0.18, 0.05)?,
        })
    }

    fn attack() -> Result<Self, NormalError> {
        Ok(Self {
            rps: Normal::new(1600.0, 220.0)?,
            bps: Normal::new(110_000_000.0, 12_000_000.0)?,
            unique_src: Normal::new(1800.0, 250.0)?,
            syn_ratio: Normal::new(0.72, 0.08)?,
        })
    }
}

/// Infinite iterator of [`TrafficSample`]s, one per second from `start_ts`.
pub struct TrafficGenerator<R: Rng> {
    rng: R,
    ddos_probability: f64,
    next_ts: i64,
    attack_left: u32,
    normal: Profile,
    attack: Profile,
}

impl TrafficGenerator<StdRng> {
    pub fn from_entropy(start_ts: i64, ddos_probability: f64) -> Result<Self, NormalError> {
        Self::with_rng(StdRng::from_entropy(), start_ts, ddos_probability)
    }
}

impl<R: Rng> TrafficGenerator<R> {
    pub fn with_rng(rng: R, start_ts: i64, ddos_probability: f64) -> Result<Self, NormalError> {
        Ok(Self {
            rng,
            ddos_probability: ddos_probability.clamp(0.0, 1.0),
            next_ts: start_ts,
            attack_left: 0,
            normal: Profile::normal()?,
            attack: Profile::attack()?,
        })
    }

    fn sample(&mut self) -> TrafficSample {
        if self.attack_left == 0 && self.rng.gen_bool(self.ddos_probability) {
            self.attack_left = self.rng.gen_range(10..=25);
        }

        let ts = self.next_ts;
        self.next_ts += 1;

        let (label, profile, floors) = if self.attack_left > 0 {
            self.attack_left -= 1;
            (TrafficLabel::Attack, self.attack, (0, 0, 0))
        } else {
            (TrafficLabel::Normal, self.normal, (50, 5_000_000, 30))
        };

        let rps = (self.rng.sample(profile.rps) as i64).max(floors.0);
        let bps = (self.rng.sample(profile.bps) as i64).max(floors.1);
        let unique_src = (self.rng.sample(profile.unique_src) as i64).max(floors.2);
        let syn_ratio = self.rng.sample(profile.syn_ratio).clamp(0.0, 1.0);
        let sources = self.sources(rps, label);

        TrafficSample {
            ts,
            rps,
            bps,
            unique_src,
            syn_ratio,
            label,
            sources,
        }
    }

    /// Top talkers: a few heavy hitters during attacks, an even spread otherwise.
    fn sources(&mut self, total_rps: i64, label: TrafficLabel) -> Vec<SourceCount> {
        let total = total_rps as f64;
        let counts: Vec<i64> = match label {
            TrafficLabel::Attack => [(0.18, 0.06), (0.16, 0.05), (0.12, 0.04), (0.09, 0.03), (0.06, 0.02)]
                .iter()
                .enumerate()
                .map(|(i, &(share, jitter))| {
                    let mut base = (total * share) as i64;
                    if i == 0 {
                        base = base.max(50);
                    }
                    base + self.rng.gen_range(0..=(total * jitter) as i64)
                })
                .collect(),
            TrafficLabel::Normal => {
                let base = (total / TOP_SOURCES.max(10) as f64).max(10.0);
                (0..TOP_SOURCES)
                    .map(|_| {
                        let z: f64 = self.rng.sample(StandardNormal);
                        ((base + base * 0.15 * z) as i64).max(1)
                    })
                    .collect()
            }
        };

        // Keep the top talkers from exceeding the total.
        let sum: i64 = counts.iter().sum();
        let scale = if sum > 0 { (total / sum as f64).min(1.0) } else { 1.0 };

        let mut sources: Vec<SourceCount> = counts
            .into_iter()
            .map(|c| SourceCount {
                src_ip: self.random_ip(),
                req: ((c as f64 * scale) as i64).max(1),
            })
            .collect();
        sources.sort_by(|a, b| b.req.cmp(&a.req));
        sources
    }

    fn random_ip(&mut self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.rng.gen_range(80..=185),
            self.rng.gen_range(0..=255),
            self.rng.gen_range(0..=255),
            self.rng.gen_range(1..=254)
        )
    }
}

impl<R: Rng> Iterator for TrafficGenerator<R> {
    type Item = TrafficSample;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.sample())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(p: f64) -> TrafficGenerator<StdRng> {
        TrafficGenerator::with_rng(StdRng::seed_from_u64(7), 1_000, p).unwrap()
    }

    #[test]
    fn test_timestamps_are_consecutive() {
        let samples: Vec<TrafficSample> = seeded(0.1).take(50).collect();
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.ts, 1_000 + i as i64);
        }
    }

    #[test]
    fn test_normal_traffic_floors() {
        for s in seeded(0.0).take(500) {
            assert_eq!(s.label, TrafficLabel::Normal);
            assert!(s.rps >= 50);
            assert!(s.bps >= 5_000_000);
            assert!(s.unique_src >= 30);
            assert!((0.0..=1.0).contains(&s.syn_ratio));
        }
    }

    #[test]
    fn test_attack_bursts_last_10_to_25_seconds() {
        let samples: Vec<TrafficSample> = seeded(1.0).take(200).collect();
        assert!(samples.iter().all(|s| s.label == TrafficLabel::Attack));

        let mut generator = seeded(0.05);
        let labels: Vec<TrafficLabel> = (0..5_000).map(|_| generator.next().unwrap().label).collect();
        let mut run = 0;
        for pair in labels.windows(2) {
            if pair[0] == TrafficLabel::Attack {
                run += 1;
            }
            if pair[0] == TrafficLabel::Attack && pair[1] == TrafficLabel::Normal {
                // Back-to-back bursts can merge, so only the lower bound is strict.
                assert!(run >= 10, "burst too short: {}", run);
                run = 0;
            }
        }
    }

    #[test]
    fn test_sources_sorted_and_bounded() {
        for s in seeded(0.1).take(300) {
            assert_eq!(s.sources.len(), TOP_SOURCES);
            assert!(s.sources.windows(2).all(|w| w[0].req >= w[1].req));
            assert!(s.sources.iter().all(|src| src.req >= 1));
            let first_octet: u8 = s.sources[0].src_ip.split('.').next().unwrap().parse().unwrap();
            assert!((80..=185).contains(&first_octet));
        }
    }

    #[test]
    fn test_regime_means() {
        let mean = |p: f64| {
            let samples: Vec<TrafficSample> = seeded(p).take(2_000).collect();
            samples.iter().map(|s| s.rps as f64).sum::<f64>() / samples.len() as f64
        };
        assert!((mean(0.0) - 420.0).abs() < 10.0);
        assert!((mean(1.0) - 1600.0).abs() < 30.0);
    }

    #[test]
    fn test_sample_point_conversion() {
        let s = seeded(0.0).next().unwrap();
        let p = s.point();
        assert_eq!(p.ts, s.ts);
        assert_eq!(p.rps, s.rps as f64);
        assert!(p.validate().is_ok());
    }
}
