// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`. Quote data is public market data, so no
// authentication is applied.
//
// CORS is configured permissively so browser dashboards on any origin can
// poll the API.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::app_state::AppState;
use crate::binance::rate_limit::RateLimitSnapshot;
use crate::types::{FeedStatus, SortOption};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/state", get(full_state))
        .route("/api/v1/quotes", get(quotes))
        .route("/api/v1/sort", get(get_sort).post(set_sort))
        .route("/api/v1/feed/restart", post(restart_feed))
        // ── WebSocket (handled separately in ws module but mounted here) ─
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    feed_status: FeedStatus,
    rate_limit: RateLimitSnapshot,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let resp = HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        feed_status: state.feed_status(),
        rate_limit: state.rate_limits.snapshot(),
        server_time: chrono::Utc::now().timestamp_millis(),
    };
    Json(resp)
}

// =============================================================================
// Full state snapshot
// =============================================================================

async fn full_state(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

// =============================================================================
// Quotes
// =============================================================================

#[derive(Deserialize)]
struct QuotesQuery {
    sort: Option<String>,
}

async fn quotes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuotesQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let ui = match query.sort {
        Some(raw) => {
            let option: SortOption = raw.parse().map_err(|e| bad_request(format!("{e}")))?;
            state.ui_state_sorted(option)
        }
        None => state.ui_state(),
    };
    Ok(Json(ui))
}

// =============================================================================
// Sort selection
// =============================================================================

#[derive(Serialize, Deserialize)]
struct SortBody {
    sort: String,
}

async fn get_sort(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(SortBody {
        sort: state.sort_option().to_string(),
    })
}

async fn set_sort(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SortBody>,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    let option: SortOption = body.sort.parse().map_err(|e| bad_request(format!("{e}")))?;
    state.set_sort(option);

    Ok(Json(SortBody {
        sort: option.to_string(),
    }))
}

// =============================================================================
// Feed control
// =============================================================================

async fn restart_feed(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!(previous = %state.feed_status(), "feed restart requested via API");
    state.request_restart();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "message": "Feed restart requested" })),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::market_data::Quote;
    use crate::runtime_config::RuntimeConfig;

    fn state_with_quotes() -> Arc<AppState> {
        let state = Arc::new(AppState::new(RuntimeConfig::default(), Default::default()));
        state.publish_snapshot(vec![
            Quote::seeded("ETHUSDT", vec![2000.0]),
            Quote::seeded("BTCUSDT", vec![37000.0]),
            Quote::seeded("ADAUSDT", vec![0.3]),
        ]);
        state
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn quotes_default_to_stored_sort() {
        let app = router(state_with_quotes());
        let resp = app
            .oneshot(Request::get("/api/v1/quotes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let json = body_json(resp).await;
        assert_eq!(json["state"], "success");
        assert_eq!(json["quotes"][0]["symbol"], "ADAUSDT");
    }

    #[tokio::test]
    async fn quotes_accept_sort_query() {
        let app = router(state_with_quotes());
        let resp = app
            .oneshot(Request::get("/api/v1/quotes?sort=price").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["quotes"][0]["symbol"], "BTCUSDT");
    }

    #[tokio::test]
    async fn invalid_sort_is_rejected() {
        let app = router(state_with_quotes());
        let resp = app
            .oneshot(Request::get("/api/v1/quotes?sort=volume").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn post_sort_updates_state() {
        let state = state_with_quotes();
        let app = router(state.clone());
        let resp = app
            .oneshot(
                Request::post("/api/v1/sort")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"sort":"change"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(state.sort_option(), SortOption::Change);
    }

    #[tokio::test]
    async fn health_reports_feed_status() {
        let app = router(state_with_quotes());
        let resp = app
            .oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["feed_status"], "Idle");
        assert_eq!(json["rate_limit"]["used_weight_1m"], 0);
    }

    #[tokio::test]
    async fn restart_is_accepted() {
        let app = router(state_with_quotes());
        let resp = app
            .oneshot(Request::post("/api/v1/feed/restart").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }
}
