//! API layer -- axum routes, handlers, and the dashboard page.

mod error;
mod routes;
pub mod state;

pub use self::error::ApiError;
use self::state::AppState;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::dashboard))
        .route("/health", get(routes::health))
        .nest("/api", routes::api_routes())
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> (axum::http::StatusCode, &'static str) {
    (axum::http::StatusCode::NOT_FOUND, "not found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{SourceCount, TrafficLabel, TrafficSample};
    use crate::storage::{self, Pool};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    fn temp_state() -> (tempfile::TempDir, Pool, AppState) {
        let dir = tempfile::TempDir::new().unwrap();
        let pool = storage::open_pool(dir.path().join("api.db")).unwrap();
        let state = AppState::new(pool.clone());
        (dir, pool, state)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, _pool, state) = temp_state();
        let (status, json) = get_json(router(state), "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["data"]["ts"].is_number());
        assert!(json["data"]["version"].is_string());
    }

    #[tokio::test]
    async fn test_metrics_listing() {
        let (_dir, pool, state) = temp_state();
        for ts in 0..3 {
            storage::insert_sample(
                &pool,
                &TrafficSample {
                    ts,
                    rps: 400,
                    bps: 28_000_000,
                    unique_src: 200,
                    syn_ratio: 0.2,
                    label: TrafficLabel::Normal,
                    sources: vec![SourceCount {
                        src_ip: "100.1.2.3".to_string(),
                        req: 40,
                    }],
                },
            )
            .unwrap();
        }

        let (status, json) = get_json(router(state.clone()), "/api/metrics?limit=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["meta"]["total"], 2);
        assert_eq!(json["data"][0]["ts"], 2);

        let (status, json) = get_json(router(state), "/api/top-sources").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"][0]["src_ip"], "100.1.2.3");
        assert_eq!(json["data"][0]["count"], 120);
    }

    #[tokio::test]
    async fn test_ingest_validates_fields() {
        let (_dir, pool, state) = temp_state();

        let (status, json) =
            post_json(router(state.clone()), "/api/metrics", r#"{"ts": 5, "bps": 1000}"#).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].as_str().unwrap().contains("rps"));
        assert!(storage::fetch_metrics(&pool, 10).unwrap().is_empty());

        let (status, json) = post_json(
            router(state),
            "/api/metrics",
            r#"{"ts": 5, "rps": 420, "bps": 28000000, "unique_src": 210}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["data"]["unique_src"], 210);
        assert_eq!(storage::fetch_metrics(&pool, 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_rejects_malformed_bodies_as_json() {
        let (_dir, pool, state) = temp_state();

        let (status, json) = post_json(
            router(state.clone()),
            "/api/metrics",
            r#"{"ts": 5, "rps": "abc", "bps": 1000}"#,
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(json["error"].is_string());

        let (status, json) = post_json(router(state), "/api/metrics", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        assert!(storage::fetch_metrics(&pool, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_listings() {
        let (_dir, _pool, state) = temp_state();
        for uri in ["/api/incidents", "/api/analysis", "/api/top-sources"] {
            let (status, json) = get_json(router(state.clone()), uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
            assert_eq!(json["meta"]["total"], 0, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_dashboard_renders() {
        let (_dir, _pool, state) = temp_state();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1_000_000)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("/api/metrics?limit=240"));
        assert!(html.contains("floodwatch"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let (_dir, _pool, state) = temp_state();
        let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let response = router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
