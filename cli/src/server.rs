use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use physio_core::dashboard::{Dashboard, RangeFilter};
use physio_core::db::Database;
use physio_core::models::{EntryForm, HealthEntry, parse_iso_date};
use physio_core::stats::{StatsWindow, WindowSpec, compute_stats, window_stats};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct StatsQuery {
    window: Option<String>,
    days: Option<String>,
}

#[derive(Deserialize)]
struct DashboardQuery {
    range: Option<String>,
    window: Option<String>,
}

#[derive(Serialize)]
struct CreatedEntry {
    success: bool,
    entry: HealthEntry,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    PayloadTooLarge,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<physio_core::Error> for ApiError {
    fn from(err: physio_core::Error) -> Self {
        use physio_core::Error;
        match err {
            Error::Validation(msg) => Self::BadRequest(msg),
            conflict @ Error::Conflict(_) => Self::Conflict(conflict.to_string()),
            Error::NotFound(msg) => Self::NotFound(msg),
            other => Self::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

fn sorted_entries(db: &Database) -> Result<Vec<HealthEntry>, ApiError> {
    let mut entries = db.list_entries().context("failed to list entries")?;
    entries.sort_by_key(|e| e.date);
    Ok(entries)
}

async fn list_entries(State(state): State<AppState>) -> Result<Json<Vec<HealthEntry>>, ApiError> {
    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(Json(sorted_entries(&db)?))
}

async fn create_entry(
    State(state): State<AppState>,
    payload: Result<Json<EntryForm>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedEntry>), ApiError> {
    let Json(form) = payload?;
    let new_entry = form.into_new_entry()?;

    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = db.create_entry(&new_entry)?;
    tracing::info!(date = %entry.date, id = entry.id, "entry created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedEntry {
            success: true,
            entry,
        }),
    ))
}

async fn get_entry(
    State(state): State<AppState>,
    Path(date_str): Path<String>,
) -> Result<Json<HealthEntry>, ApiError> {
    let date = parse_iso_date(&date_str)?;

    let db = state
        .db
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let entry = db
        .get_entry(date)?
        .ok_or_else(|| ApiError::NotFound(format!("No entry for {date}")))?;
    Ok(Json(entry))
}

async fn get_stats(
    State(state): State<AppState>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsWindow>, ApiError> {
    let spec = WindowSpec::parse(params.window.as_deref(), params.days.as_deref())?;

    let entries = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        db.list_entries()?
    };

    let stats = compute_stats(&entries, &spec, Local::now().date_naive())?;
    Ok(Json(stats))
}

async fn get_dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = params
        .range
        .as_deref()
        .map(RangeFilter::parse)
        .transpose()?
        .unwrap_or_default();
    let spec = WindowSpec::parse(params.window.as_deref(), None)?;

    let entries = {
        let db = state
            .db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        sorted_entries(&db)?
    };
    let stats = window_stats(&entries, &spec, Local::now().date_naive())?;

    let mut dashboard = Dashboard::new();
    dashboard.replace(entries, stats);
    dashboard.apply_range(range);

    let value = serde_json::to_value(dashboard.view()).context("failed to serialize dashboard")?;
    Ok(Json(value))
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/entries", get(list_entries).post(create_entry))
        .route("/api/entries/{date}", get(get_entry))
        .route("/api/stats", get(get_stats))
        .route("/api/dashboard", get(get_dashboard))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub(crate) fn app(db: Database) -> Router {
    build_router(AppState {
        db: Arc::new(Mutex::new(db)),
    })
}

// --- Server startup ---

pub async fn start_server(db: Database, port: u16, bind: &str) -> anyhow::Result<()> {
    let app = app(db);

    if bind != "127.0.0.1" && bind != "localhost" {
        tracing::warn!(
            bind,
            "listening beyond localhost with no authentication; any device on your network can read and write entries"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    tracing::info!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use physio_core::models::NewHealthEntry;
    use tower::ServiceExt;

    fn date(s: &str) -> chrono::NaiveDate {
        parse_iso_date(s).unwrap()
    }

    fn seeded_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        let weights = [Some(70.0), Some(71.0), None, Some(72.0), Some(73.0), Some(74.0)];
        for (day, weight) in (10..=15).zip(weights) {
            db.create_entry(&NewHealthEntry {
                weight,
                ..NewHealthEntry::for_date(date(&format!("2026-02-{day}")))
            })
            .unwrap();
        }
        db
    }

    fn test_app() -> Router {
        app(Database::open_in_memory().unwrap())
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn security_headers_present() {
        let response = test_app().oneshot(get_request("/api/entries")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let big_body = vec![b' '; BODY_LIMIT + 1];
        let response = test_app()
            .oneshot(
                axum::http::Request::post("/api/entries")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("secret database path /home/user/physio.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
        assert!(!json["error"].as_str().unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn list_entries_empty() {
        let response = test_app().oneshot(get_request("/api/entries")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn create_entry_returns_201() {
        let app = test_app();
        let body = serde_json::json!({
            "date": "2026-02-10",
            "weight": "70.4",
            "body_fat": 18.2,
            "calories": "",
            "steps": 9800,
            "sleep_total": "7:30",
            "sleep_quality": " good ",
            "observations": ""
        });

        let response = app.clone().oneshot(post_json("/api/entries", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["entry"]["date"], "2026-02-10");
        assert_eq!(json["entry"]["weight"], 70.4);
        assert!(json["entry"]["calories"].is_null());
        assert_eq!(json["entry"]["steps"], 9800);
        assert_eq!(json["entry"]["sleep_total"], 7.5);
        assert_eq!(json["entry"]["sleep_quality"], "good");
        assert!(json["entry"]["observations"].is_null());

        let response = app.oneshot(get_request("/api/entries/2026-02-10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["weight"], 70.4);
    }

    #[tokio::test]
    async fn create_entry_duplicate_returns_409() {
        let app = test_app();
        let body = serde_json::json!({ "date": "2026-02-10", "weight": 70 });

        let first = app.clone().oneshot(post_json("/api/entries", &body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(post_json("/api/entries", &body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(
            body_json(second).await["error"],
            "An entry for 2026-02-10 already exists"
        );
    }

    #[tokio::test]
    async fn create_entry_validation_returns_400() {
        let app = test_app();
        for body in [
            serde_json::json!({ "weight": 70 }),
            serde_json::json!({ "date": "10/02/2026" }),
            serde_json::json!({ "date": "2026-02-10", "weight": "heavy" }),
            serde_json::json!({ "date": "2026-02-10", "body_fat": 140 }),
        ] {
            let response = app.clone().oneshot(post_json("/api/entries", &body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            assert!(body_json(response).await["error"].is_string());
        }
    }

    #[tokio::test]
    async fn create_entry_malformed_json_returns_400() {
        let response = test_app()
            .oneshot(
                axum::http::Request::post("/api/entries")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn get_entry_errors() {
        let app = test_app();

        let response = app.clone().oneshot(get_request("/api/entries/2026-02-10")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get_request("/api/entries/yesterday")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_entries_sorted_by_date() {
        let app = app(seeded_db());
        let json = body_json(app.oneshot(get_request("/api/entries")).await.unwrap()).await;
        let dates: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["date"].as_str().unwrap())
            .collect();
        assert_eq!(dates.len(), 6);
        assert_eq!(dates[0], "2026-02-10");
        assert_eq!(dates[5], "2026-02-15");
    }

    #[tokio::test]
    async fn stats_seven_day_window() {
        let response = app(seeded_db())
            .oneshot(get_request("/api/stats?window=7d"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["window"], "7d");
        assert_eq!(json["window_days"], 7);
        assert_eq!(json["start_date"], "2026-02-09");
        assert_eq!(json["end_date"], "2026-02-15");
        assert_eq!(json["stats"]["avg_weight"], 72.0);
        assert_eq!(json["stats"]["total_entries"], 6);
    }

    #[tokio::test]
    async fn stats_defaults_to_all_time() {
        let json = body_json(app(seeded_db()).oneshot(get_request("/api/stats")).await.unwrap()).await;
        assert_eq!(json["window"], "all");
        assert!(json["window_days"].is_null());
    }

    #[tokio::test]
    async fn stats_days_parameter() {
        let json = body_json(
            app(seeded_db())
                .oneshot(get_request("/api/stats?days=2"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(json["start_date"], "2026-02-14");
        assert_eq!(json["stats"]["avg_weight"], 73.5);
    }

    #[tokio::test]
    async fn stats_empty_store_returns_404() {
        let response = test_app().oneshot(get_request("/api/stats?window=30d")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn stats_malformed_window_returns_400() {
        let app = test_app();
        for uri in ["/api/stats?window=7w", "/api/stats?days=0", "/api/stats?days=abc"] {
            let response = app.clone().oneshot(get_request(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn dashboard_model() {
        let response = app(seeded_db())
            .oneshot(get_request("/api/dashboard?range=3d&window=7d"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["range"], "3d");
        assert_eq!(json["latest_date"], "2026-02-15");
        assert_eq!(json["visible_from"], "2026-02-13");
        assert_eq!(json["stats"]["window"], "7d");
        assert_eq!(json["charts"].as_array().unwrap().len(), 4);
        assert_eq!(
            json["charts"][0]["series"][0]["points"]
                .as_array()
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn dashboard_on_empty_store_has_placeholders() {
        let json = body_json(test_app().oneshot(get_request("/api/dashboard")).await.unwrap()).await;
        assert_eq!(json["range"], "90d");
        assert!(json["latest_date"].is_null());
        assert!(json["stats"].is_null());
        assert!(json["cards"][0]["value"].is_null());
    }

    #[tokio::test]
    async fn dashboard_bad_range_returns_400() {
        let response = test_app()
            .oneshot(get_request("/api/dashboard?range=soon"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
