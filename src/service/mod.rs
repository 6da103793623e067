//! Background loops for the live service: a synthetic producer appending
//! samples to storage, and an analyzer periodically replaying recent points.
//!
//! The two loops only share the database. The analyzer builds a fresh
//! detector on every pass, so no detector state crosses task boundaries.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::analysis::analyze_recent;
use crate::collector::TrafficGenerator;
use crate::config::{AnalysisConfig, CollectorConfig, DetectorConfig};
use crate::storage::{self, Pool};

/// Produce one synthetic sample per collector interval, forever.
pub async fn run_producer_loop(pool: Pool, config: CollectorConfig) {
    info!(ddos_probability = config.ddos_probability, "Traffic producer started");

    let start_ts = chrono::Utc::now().timestamp();
    let mut generator = match TrafficGenerator::from_entropy(start_ts, config.ddos_probability) {
        Ok(generator) => generator,
        Err(e) => {
            error!("Failed to build traffic generator: {}", e);
            return;
        }
    };
    let mut interval = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));

    loop {
        interval.tick().await;

        let Some(sample) = generator.next() else {
            break;
        };
        let ts = sample.ts;
        let label = sample.label;
        let pool = pool.clone();

        match tokio::task::spawn_blocking(move || storage::insert_sample(&pool, &sample)).await {
            Ok(Ok(())) => debug!(ts, ?label, "Sample stored"),
            Ok(Err(e)) => error!(ts, "Failed to store sample: {:#}", e),
            Err(e) => error!(ts, "Producer task panicked: {}", e),
        }
    }

    warn!("Traffic producer stopped");
}

/// Re-run the detection pipeline over recent points every analysis interval.
/// Failures are logged and the loop carries on with the next pass.
pub async fn run_analysis_loop(pool: Pool, detector: DetectorConfig, config: AnalysisConfig) {
    info!(
        limit = config.limit,
        interval_ms = config.interval_ms,
        "Analyzer started"
    );

    let mut interval = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));

    loop {
        interval.tick().await;

        let pool = pool.clone();
        let detector = detector.clone();
        let (limit, tail) = (config.limit, config.persist_tail);

        match tokio::task::spawn_blocking(move || analyze_recent(&pool, &detector, limit, tail)).await {
            Ok(Ok(report)) => {
                if report.incidents_written > 0 {
                    info!(incidents = report.incidents_written, "New incidents recorded");
                }
            }
            Ok(Err(e)) => error!("Analysis pass failed: {:#}", e),
            Err(e) => error!("Analysis task panicked: {}", e),
        }
    }
}
