use crate::config::DetectorConfig;
use crate::detect::{AnomalyKind, DetectionResult, Incident, Severity};
use tracing::info;

/// Incidents lasting at least this many seconds are rated [`Severity::High`].
pub const HIGH_SEVERITY_SECS: i64 = 15;

/// Map an incident duration (seconds) to a severity.
pub fn severity_for(duration: i64) -> Severity {
    if duration >= HIGH_SEVERITY_SECS {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Collapses contiguous anomalous [`DetectionResult`]s into [`Incident`]s.
///
/// The open-run state survives between calls, so a resumed analysis can keep
/// feeding the same grouper and an incident spanning two batches is emitted
/// once.
#[derive(Debug, Clone)]
pub struct IncidentGrouper {
    z_threshold: f64,
    rps_hard_threshold: f64,
    bps_hard_threshold: f64,
    /// `Some(start_ts)` while inside an incident.
    open_since: Option<i64>,
    last_ts: Option<i64>,
}

impl IncidentGrouper {
    pub fn new(config: &DetectorConfig) -> Self {
        Self {
            z_threshold: config.z_threshold,
            rps_hard_threshold: config.rps_hard_threshold,
            bps_hard_threshold: config.bps_hard_threshold,
            open_since: None,
            last_ts: None,
        }
    }

    pub fn in_incident(&self) -> bool {
        self.open_since.is_some()
    }

    /// Start of the currently open incident, if any.
    pub fn incident_start_ts(&self) -> Option<i64> {
        self.open_since
    }

    /// Feed the next result. Returns the incident closed by this point, if the
    /// point ends an anomalous run. The closing point's own ts is the `end_ts`.
    pub fn feed(&mut self, result: &DetectionResult) -> Option<Incident> {
        self.last_ts = Some(result.ts);
        match (self.open_since, result.is_anomaly) {
            (None, true) => {
                self.open_since = Some(result.ts);
                None
            }
            (Some(start_ts), false) => {
                self.open_since = None;
                Some(self.close(start_ts, result.ts))
            }
            _ => None,
        }
    }

    /// Close a run still open at end of stream, using the last seen timestamp.
    pub fn finish(&mut self) -> Option<Incident> {
        let start_ts = self.open_since.take()?;
        let end_ts = self.last_ts.unwrap_or(start_ts);
        Some(self.close(start_ts, end_ts))
    }

    /// Feed a whole sequence and close any trailing open run.
    pub fn group(&mut self, results: &[DetectionResult]) -> Vec<Incident> {
        let mut incidents: Vec<Incident> = results.iter().filter_map(|r| self.feed(r)).collect();
        incidents.extend(self.finish());
        incidents
    }

    fn close(&self, start_ts: i64, end_ts: i64) -> Incident {
        let duration = (end_ts - start_ts).max(1);
        let severity = severity_for(duration);
        let details = format!(
            "anomaly window: {}-{}; duration={}s; thresholds: z>={} or rps>={} or bps>={}",
            start_ts, end_ts, duration, self.z_threshold, self.rps_hard_threshold, self.bps_hard_threshold
        );
        info!(start_ts, end_ts, duration, %severity, "Incident closed");

        Incident {
            start_ts,
            end_ts,
            kind: AnomalyKind::TrafficSpike,
            severity,
            details,
        }
    }
}
