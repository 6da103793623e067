//! Anomaly detection and incident grouping.
//!
//! The pipeline is: ordered [`MetricPoint`]s -> [`Detector`] -> ordered
//! [`DetectionResult`]s -> [`IncidentGrouper`] -> [`Incident`]s. Nothing in
//! here performs I/O; the analysis runner owns reading and persisting.

pub mod engine;
pub mod hysteresis;
pub mod incident;
pub mod scorer;
pub mod window;

pub use self::engine::{detect_points, Detector};
pub use self::hysteresis::HysteresisGate;
pub use self::incident::{severity_for, IncidentGrouper};
pub use self::scorer::{PointScore, PointScorer};
pub use self::window::{StatWindow, WindowStats};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DetectError {
    #[error("metric point is missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid value for `{field}`: {value} (must be finite and non-negative)")]
    InvalidValue { field: &'static str, value: f64 },

    #[error("invalid detector configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("out-of-order point: ts {ts} arrived after ts {previous}")]
    OutOfOrder { previous: i64, ts: i64 },
}

/// One per-second traffic aggregate, as consumed by the [`Detector`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub ts: i64,
    pub rps: f64,
    pub bps: f64,
}

impl MetricPoint {
    pub fn new(ts: i64, rps: f64, bps: f64) -> Self {
        Self { ts, rps, bps }
    }

    /// Reject negative or non-finite signal values.
    pub fn validate(&self) -> Result<(), DetectError> {
        for (field, value) in [("rps", self.rps), ("bps", self.bps)] {
            if !value.is_finite() || value < 0.0 {
                return Err(DetectError::InvalidValue { field, value });
            }
        }
        Ok(())
    }
}

/// Loosely-typed metric record as it arrives over the wire.
///
/// Every field is optional so that a missing `ts`/`rps`/`bps` surfaces as a
/// [`DetectError::MissingField`] instead of an opaque deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricRecord {
    pub ts: Option<i64>,
    pub rps: Option<f64>,
    pub bps: Option<f64>,
    #[serde(default)]
    pub unique_src: Option<i64>,
    #[serde(default)]
    pub syn_ratio: Option<f64>,
}

impl TryFrom<&MetricRecord> for MetricPoint {
    type Error = DetectError;

    fn try_from(record: &MetricRecord) -> Result<Self, Self::Error> {
        let ts = record.ts.ok_or(DetectError::MissingField { field: "ts" })?;
        let rps = record.rps.ok_or(DetectError::MissingField { field: "rps" })?;
        let bps = record.bps.ok_or(DetectError::MissingField { field: "bps" })?;
        let point = MetricPoint::new(ts, rps, bps);
        point.validate()?;
        Ok(point)
    }
}

/// Classification attached to every [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TrafficSpike,
    None,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::TrafficSpike => "traffic_spike",
            AnomalyKind::None => "none",
        }
    }
}

impl std::fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-point detector output. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub ts: i64,
    pub z_rps: f64,
    pub z_bps: f64,
    pub score: f64,
    pub is_anomaly: bool,
    pub kind: AnomalyKind,
}

/// Severity levels for grouped incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

/// A contiguous run of confirmed anomalies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub start_ts: i64,
    pub end_ts: i64,
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub details: String,
}

impl Incident {
    /// Duration in seconds, never less than one.
    pub fn duration(&self) -> i64 {
        (self.end_ts - self.start_ts).max(1)
    }
}
