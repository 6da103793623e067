use crate::config::DetectorConfig;
use crate::detect::{
    AnomalyKind, DetectError, DetectionResult, HysteresisGate, MetricPoint, PointScorer,
    StatWindow,
};
use tracing::{debug, trace};

/// Streaming two-signal (rate, volume) detector.
///
/// Owns the trailing windows and the hysteresis counter. Feeding a batch
/// through [`Detector::process`] is equivalent to feeding the same points one
/// at a time through [`Detector::process_point`]. A single instance must not
/// be fed from more than one producer at a time.
#[derive(Debug, Clone)]
pub struct Detector {
    config: DetectorConfig,
    scorer: PointScorer,
    rps_window: StatWindow,
    bps_window: StatWindow,
    gate: HysteresisGate,
    last_ts: Option<i64>,
}

impl Detector {
    pub fn new(config: DetectorConfig) -> Result<Self, DetectError> {
        config.validate()?;
        Ok(Self {
            scorer: PointScorer::from_config(&config),
            rps_window: StatWindow::new(config.window_size),
            bps_window: StatWindow::new(config.window_size),
            gate: HysteresisGate::new(config.min_consecutive_points),
            last_ts: None,
            config,
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Timestamp of the last point observed, if any.
    pub fn last_ts(&self) -> Option<i64> {
        self.last_ts
    }

    /// Score one point. Fails without touching any state if the point is
    /// malformed or its timestamp regresses.
    pub fn process_point(&mut self, point: &MetricPoint) -> Result<DetectionResult, DetectError> {
        self.check(point, self.last_ts)?;
        Ok(self.step(point))
    }

    /// Score an ordered batch. The whole batch is validated up front, so an
    /// error leaves the detector exactly as it was.
    pub fn process(&mut self, points: &[MetricPoint]) -> Result<Vec<DetectionResult>, DetectError> {
        let mut previous = self.last_ts;
        for point in points {
            self.check(point, previous)?;
            previous = Some(point.ts);
        }

        let results: Vec<DetectionResult> = points.iter().map(|p| self.step(p)).collect();
        debug!(
            points = results.len(),
            anomalies = results.iter().filter(|r| r.is_anomaly).count(),
            "Detector batch processed"
        );
        Ok(results)
    }

    fn check(&self, point: &MetricPoint, previous: Option<i64>) -> Result<(), DetectError> {
        point.validate()?;
        if let Some(previous) = previous {
            if point.ts < previous {
                return Err(DetectError::OutOfOrder { previous, ts: point.ts });
            }
        }
        Ok(())
    }

    fn step(&mut self, point: &MetricPoint) -> DetectionResult {
        // Baseline reflects only earlier points.
        let score = self.scorer.score(
            point.rps,
            point.bps,
            self.rps_window.stats(),
            self.bps_window.stats(),
        );
        let is_anomaly = self.gate.update(score.is_candidate);
        let kind = if is_anomaly {
            AnomalyKind::TrafficSpike
        } else {
            AnomalyKind::None
        };

        trace!(
            ts = point.ts,
            z_rps = score.z_rps,
            z_bps = score.z_bps,
            hard_hit = score.hard_hit,
            consecutive = self.gate.consecutive_hits(),
            "Point scored"
        );

        self.rps_window.observe(point.rps);
        self.bps_window.observe(point.bps);
        self.last_ts = Some(point.ts);

        DetectionResult {
            ts: point.ts,
            z_rps: score.z_rps,
            z_bps: score.z_bps,
            score: score.score,
            is_anomaly,
            kind,
        }
    }
}

/// Run a freshly initialised [`Detector`] over `points`.
pub fn detect_points(
    points: &[MetricPoint],
    config: &DetectorConfig,
) -> Result<Vec<DetectionResult>, DetectError> {
    Detector::new(config.clone())?.process(points)
}
