//! API route definitions.

use askama::Template;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::{routing::get, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::detect::{MetricPoint, MetricRecord};
use crate::storage::{self, MetricRow, Pool};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(list_metrics).post(ingest_metric))
        .route("/incidents", get(list_incidents))
        .route("/analysis", get(list_analysis))
        .route("/top-sources", get(top_sources))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopSourcesQuery {
    limit: Option<usize>,
    window: Option<i64>,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate<'a> {
    metrics_url: &'a str,
    incidents_url: &'a str,
    analysis_url: &'a str,
    top_sources_url: &'a str,
    refresh_ms: u64,
}

/// Run a storage call off the async runtime.
async fn blocking<T, F>(pool: &Pool, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Pool) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    let result = tokio::task::spawn_blocking(move || f(&pool))
        .await
        .map_err(|e| ApiError::Internal(e.into()))?;
    Ok(result?)
}

fn listing<T: serde::Serialize>(rows: Vec<T>) -> Json<Value> {
    let total = rows.len();
    Json(json!({ "data": rows, "meta": { "total": total } }))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "data": {
            "status": "ok",
            "ts": chrono::Utc::now().timestamp(),
            "version": env!("CARGO_PKG_VERSION")
        },
        "meta": {
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION")
        }
    }))
}

pub async fn dashboard(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let page = DashboardTemplate {
        metrics_url: "/api/metrics?limit=240",
        incidents_url: "/api/incidents?limit=80",
        analysis_url: "/api/analysis?limit=240",
        top_sources_url: "/api/top-sources?limit=5&window=3600",
        refresh_ms: state.refresh_ms,
    };
    let html = page
        .render()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("dashboard render failed: {}", e)))?;
    Ok(Html(html))
}

async fn list_metrics(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(200);
    let rows = blocking(&state.pool, move |pool| storage::fetch_metrics(pool, limit)).await?;
    Ok(listing(rows))
}

/// Ingestion path: validate before anything touches storage.
async fn ingest_metric(
    State(state): State<AppState>,
    payload: Result<Json<MetricRecord>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let Json(record) = payload?;
    let point = MetricPoint::try_from(&record)?;
    let row = MetricRow {
        ts: point.ts,
        rps: point.rps,
        bps: point.bps,
        unique_src: record.unique_src.unwrap_or(0).max(0),
        syn_ratio: record.syn_ratio.unwrap_or(0.0).clamp(0.0, 1.0),
    };
    tracing::debug!(ts = row.ts, rps = row.rps, bps = row.bps, "Metric ingested");

    let stored = row.clone();
    blocking(&state.pool, move |pool| storage::insert_metric(pool, &stored)).await?;
    Ok((StatusCode::CREATED, Json(json!({ "data": row }))))
}

async fn list_incidents(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(50);
    let rows = blocking(&state.pool, move |pool| storage::fetch_incidents(pool, limit)).await?;
    Ok(listing(rows))
}

async fn list_analysis(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(200);
    let rows = blocking(&state.pool, move |pool| storage::fetch_analysis(pool, limit)).await?;
    Ok(listing(rows))
}

async fn top_sources(
    State(state): State<AppState>,
    Query(q): Query<TopSourcesQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = q.limit.unwrap_or(5);
    let window = q.window.unwrap_or(3600);
    let rows =
        blocking(&state.pool, move |pool| storage::fetch_top_sources(pool, limit, window)).await?;
    Ok(listing(rows))
}
