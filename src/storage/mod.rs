//! SQLite storage layer -- schema, queries, migrations.
//!
//! The store is keyed by second-resolution `ts`. Metrics and analysis rows
//! are upserted; incidents are append-only and deduplicated on `start_ts`.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde::Serialize;

use crate::collector::TrafficSample;
use crate::detect::{DetectionResult, Incident, MetricPoint};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: impl AsRef<Path>) -> Result<Pool> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub ts: i64,
    pub rps: f64,
    pub bps: f64,
    pub unique_src: i64,
    pub syn_ratio: f64,
}

impl MetricRow {
    pub fn point(&self) -> MetricPoint {
        MetricPoint::new(self.ts, self.rps, self.bps)
    }
}

/// Analysis row joined with the metric it scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub ts: i64,
    pub z_rps: f64,
    pub z_bps: f64,
    pub score: f64,
    pub is_anomaly: bool,
    pub rps: f64,
    pub bps: f64,
    pub unique_src: i64,
    pub syn_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentRow {
    pub id: i64,
    pub start_ts: i64,
    pub end_ts: i64,
    pub kind: String,
    pub severity: String,
    pub details: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopSource {
    pub src_ip: String,
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Store one aggregate metric, replacing any row with the same `ts`.
pub fn insert_metric(pool: &Pool, row: &MetricRow) -> Result<()> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO metrics (ts, rps, bps, unique_src, syn_ratio) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(ts) DO UPDATE SET
            rps = excluded.rps, bps = excluded.bps,
            unique_src = excluded.unique_src, syn_ratio = excluded.syn_ratio",
        params![row.ts, row.rps, row.bps, row.unique_src, row.syn_ratio],
    )
    .context("Failed to insert metric")?;
    Ok(())
}

/// Store a generated sample together with its top sources in one transaction.
pub fn insert_sample(pool: &Pool, sample: &TrafficSample) -> Result<()> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO metrics (ts, rps, bps, unique_src, syn_ratio) VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(ts) DO UPDATE SET
            rps = excluded.rps, bps = excluded.bps,
            unique_src = excluded.unique_src, syn_ratio = excluded.syn_ratio",
        params![
            sample.ts,
            sample.rps as f64,
            sample.bps as f64,
            sample.unique_src,
            sample.syn_ratio
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO sources (ts, src_ip, req) VALUES (?1, ?2, ?3)
             ON CONFLICT(ts, src_ip) DO UPDATE SET req = excluded.req",
        )?;
        for source in &sample.sources {
            stmt.execute(params![sample.ts, source.src_ip, source.req])?;
        }
    }

    tx.commit().context("Failed to commit traffic sample")?;
    Ok(())
}

/// Newest `limit` metrics, newest first.
pub fn fetch_metrics(pool: &Pool, limit: usize) -> Result<Vec<MetricRow>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT ts, rps, bps, unique_src, syn_ratio FROM metrics ORDER BY ts DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(MetricRow {
            ts: row.get(0)?,
            rps: row.get(1)?,
            bps: row.get(2)?,
            unique_src: row.get(3)?,
            syn_ratio: row.get(4)?,
        })
    })?;

    let mut metrics = Vec::new();
    for r in rows {
        metrics.push(r?);
    }
    Ok(metrics)
}

/// Newest `limit` points in ascending `ts` order, ready for the detector.
pub fn fetch_recent_points(pool: &Pool, limit: usize) -> Result<Vec<MetricPoint>> {
    let mut metrics = fetch_metrics(pool, limit)?;
    metrics.reverse();
    Ok(metrics.iter().map(MetricRow::point).collect())
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Upsert detection results keyed by `ts`.
pub fn insert_analysis(pool: &Pool, results: &[DetectionResult]) -> Result<usize> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO analysis (ts, z_rps, z_bps, score, is_anomaly) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ts) DO UPDATE SET
                z_rps = excluded.z_rps, z_bps = excluded.z_bps,
                score = excluded.score, is_anomaly = excluded.is_anomaly",
        )?;
        for r in results {
            stmt.execute(params![r.ts, r.z_rps, r.z_bps, r.score, r.is_anomaly as i64])?;
        }
    }
    tx.commit().context("Failed to commit analysis rows")?;
    Ok(results.len())
}

/// Newest `limit` analysis rows joined with their metrics, newest first.
pub fn fetch_analysis(pool: &Pool, limit: usize) -> Result<Vec<AnalysisRow>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT a.ts, a.z_rps, a.z_bps, a.score, a.is_anomaly,
                m.rps, m.bps, m.unique_src, m.syn_ratio
         FROM analysis a
         JOIN metrics m ON m.ts = a.ts
         ORDER BY a.ts DESC
         LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(AnalysisRow {
            ts: row.get(0)?,
            z_rps: row.get(1)?,
            z_bps: row.get(2)?,
            score: row.get(3)?,
            is_anomaly: row.get::<_, i64>(4)? != 0,
            rps: row.get(5)?,
            bps: row.get(6)?,
            unique_src: row.get(7)?,
            syn_ratio: row.get(8)?,
        })
    })?;

    let mut analysis = Vec::new();
    for r in rows {
        analysis.push(r?);
    }
    Ok(analysis)
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Append an incident. Returns `false` when an incident with the same
/// `start_ts` is already stored.
pub fn insert_incident(pool: &Pool, incident: &Incident) -> Result<bool> {
    let conn = pool.get()?;
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO incidents (start_ts, end_ts, kind, severity, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                incident.start_ts,
                incident.end_ts,
                incident.kind.as_str(),
                incident.severity.as_str(),
                incident.details,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .context("Failed to insert incident")?;
    Ok(changed > 0)
}

/// Newest `limit` incidents, newest first.
pub fn fetch_incidents(pool: &Pool, limit: usize) -> Result<Vec<IncidentRow>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT id, start_ts, end_ts, kind, severity, details, created_at
         FROM incidents ORDER BY id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map(params![limit as i64], |row| {
        Ok(IncidentRow {
            id: row.get(0)?,
            start_ts: row.get(1)?,
            end_ts: row.get(2)?,
            kind: row.get(3)?,
            severity: row.get(4)?,
            details: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;

    let mut incidents = Vec::new();
    for r in rows {
        incidents.push(r?);
    }
    Ok(incidents)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Top sources by request count over `window_seconds` ending at the newest
/// stored metric, so replayed or synthetic data still yields results.
pub fn fetch_top_sources(pool: &Pool, limit: usize, window_seconds: i64) -> Result<Vec<TopSource>> {
    let conn = pool.get()?;
    let max_ts: Option<i64> = conn.query_row("SELECT MAX(ts) FROM metrics", [], |row| row.get(0))?;
    let Some(max_ts) = max_ts else {
        return Ok(Vec::new());
    };
    let min_ts = max_ts - window_seconds;

    let mut stmt = conn.prepare(
        "SELECT src_ip, SUM(req) AS cnt
         FROM sources
         WHERE ts BETWEEN ?1 AND ?2
         GROUP BY src_ip
         ORDER BY cnt DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![min_ts, max_ts, limit as i64], |row| {
        Ok(TopSource {
            src_ip: row.get(0)?,
            count: row.get(1)?,
        })
    })?;

    let mut sources = Vec::new();
    for r in rows {
        sources.push(r?);
    }
    Ok(sources)
}
