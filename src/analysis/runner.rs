use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::DetectorConfig;
use crate::detect::{Detector, DetectionResult, Incident, IncidentGrouper};
use crate::storage::{self, Pool};

/// Summary of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Points replayed through the detector.
    pub points: usize,
    /// Replayed points flagged anomalous.
    pub anomalies: usize,
    /// Analysis rows written.
    pub rows_written: usize,
    /// Incidents newly appended to storage.
    pub incidents_written: usize,
}

/// Run the full pipeline over the newest `limit` stored points:
/// 1. Fetch points (ascending)
/// 2. Replay them through a fresh detector
/// 3. Group incidents, closing any run still open at the end
/// 4. Persist every analysis row and incident
pub fn analyze_batch(pool: &Pool, config: &DetectorConfig, limit: usize) -> Result<AnalysisReport> {
    let points = storage::fetch_recent_points(pool, limit)?;
    let results = Detector::new(config.clone())
        .context("Invalid detector configuration")?
        .process(&points)
        .context("Detector rejected stored points")?;

    let incidents = IncidentGrouper::new(config).group(&results);
    let report = persist(pool, &results, &incidents)?;

    info!(
        points = report.points,
        anomalies = report.anomalies,
        incidents = report.incidents_written,
        "Batch analysis complete"
    );
    Ok(report)
}

/// Live analysis pass.
///
/// Detector state is re-derived from scratch on every pass instead of being
/// carried between passes. Only the newest `persist_tail` analysis rows are
/// rewritten, and only incidents already closed by a normal point are stored;
/// a run still open is picked up by a later pass once it ends.
///
/// When the replay does not reach back to the oldest stored point, its first
/// `window_size + min_consecutive_points - 1` results were scored against a
/// partial baseline. Those rows are not persisted and incidents starting
/// inside that warm-up are dropped.
pub fn analyze_recent(
    pool: &Pool,
    config: &DetectorConfig,
    limit: usize,
    persist_tail: usize,
) -> Result<AnalysisReport> {
    let points = storage::fetch_recent_points(pool, limit)?;
    let mut detector = Detector::new(config.clone()).context("Invalid detector configuration")?;
    let results = detector
        .process(&points)
        .context("Detector rejected stored points")?;

    // A full page may have older points behind it.
    let truncated = limit > 0 && points.len() >= limit;
    let settled = if truncated {
        warm_up_len(detector.config()).min(results.len())
    } else {
        0
    };
    let horizon = results.get(settled).map(|r| r.ts);

    let mut grouper = IncidentGrouper::new(detector.config());
    let incidents: Vec<Incident> = results
        .iter()
        .filter_map(|r| grouper.feed(r))
        .filter(|incident| horizon.is_some_and(|h| incident.start_ts >= h))
        .collect();

    let tail_start = results.len().saturating_sub(persist_tail).max(settled);
    let mut report = persist(pool, &results[tail_start..], &incidents)?;
    report.points = results.len();
    report.anomalies = results.iter().filter(|r| r.is_anomaly).count();

    debug!(
        points = report.points,
        truncated,
        settled,
        rows = report.rows_written,
        incidents = report.incidents_written,
        open = grouper.in_incident(),
        "Live analysis pass complete"
    );
    Ok(report)
}

/// Results a replay needs before both the window and the gate reflect the
/// stored history rather than the replay's starting point.
fn warm_up_len(config: &DetectorConfig) -> usize {
    config.window_size + (config.min_consecutive_points as usize).saturating_sub(1)
}

fn persist(pool: &Pool, results: &[DetectionResult], incidents: &[Incident]) -> Result<AnalysisReport> {
    let rows_written = storage::insert_analysis(pool, results)?;

    let mut incidents_written = 0;
    for incident in incidents {
        if storage::insert_incident(pool, incident)? {
            incidents_written += 1;
        }
    }

    Ok(AnalysisReport {
        points: results.len(),
        anomalies: results.iter().filter(|r| r.is_anomaly).count(),
        rows_written,
        incidents_written,
    })
}
