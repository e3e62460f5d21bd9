use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::{CycleError, StoreError};
use crate::feeds::Category;
use crate::pipeline::{today_string, FetchPipeline};
use crate::store::{NewsRecord, NewsStore};

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<FetchPipeline>,
    store: Arc<dyn NewsStore>,
}

impl AppState {
    pub fn new(pipeline: Arc<FetchPipeline>) -> Self {
        let store = pipeline.store();
        Self { pipeline, store }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/news", get(get_news))
        .route("/api/news/fetch", post(fetch_news))
        .route("/api/news/dates", get(get_dates))
        .route("/api/news/navigate", get(navigate))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Handler failure rendered as a plain-text body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, msg).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        tracing::warn!(target: "store", error = %e, "store query failed");
        ApiError::Internal(e.to_string())
    }
}

impl From<CycleError> for ApiError {
    fn from(e: CycleError) -> Self {
        ApiError::Internal(format!("fetch failed: {e}"))
    }
}

/// Accepts `YYYY-MM-DD` and returns it in canonical zero-padded form.
fn parse_date(raw: &str) -> Result<String, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| ApiError::BadRequest(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

fn non_empty<'a>(q: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    q.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

#[derive(serde::Serialize)]
struct NewsOut {
    date: String,
    domestic: Vec<NewsRecord>,
    global: Vec<NewsRecord>,
    has_prev: bool,
    has_next: bool,
}

async fn get_news(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<NewsOut>, ApiError> {
    let date = match non_empty(&q, "date") {
        Some(raw) => parse_date(raw)?,
        None => state.store.latest_date().await?.unwrap_or_else(today_string),
    };

    let (domestic, global): (Vec<_>, Vec<_>) = state
        .store
        .articles_for_date(&date)
        .await?
        .into_iter()
        .partition(|r| r.category == Category::Domestic);
    let has_prev = state.store.prev_date(&date).await?.is_some();
    let has_next = state.store.next_date(&date).await?.is_some();

    Ok(Json(NewsOut {
        date,
        domestic,
        global,
        has_prev,
        has_next,
    }))
}

#[derive(serde::Serialize)]
struct FetchOut {
    status: &'static str,
    message: String,
    date: String,
}

async fn fetch_news(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<FetchOut>, ApiError> {
    let date = match non_empty(&q, "date") {
        Some(raw) => parse_date(raw)?,
        None => today_string(),
    };

    tracing::info!(target: "pipeline", date, "manual fetch requested");
    let report = state.pipeline.run_fetch_cycle(&date).await.map_err(|e| {
        tracing::warn!(target: "pipeline", date, error = %e, "manual fetch failed");
        ApiError::from(e)
    })?;

    Ok(Json(FetchOut {
        status: "ok",
        message: format!(
            "fetched {} domestic and {} global articles",
            report.domestic_selected, report.global_selected
        ),
        date,
    }))
}

async fn get_dates(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.store.all_dates().await?))
}

#[derive(serde::Serialize)]
struct NavigateOut {
    date: String,
}

async fn navigate(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Result<Json<NavigateOut>, ApiError> {
    let (Some(raw), Some(dir)) = (non_empty(&q, "date"), non_empty(&q, "dir")) else {
        return Err(ApiError::BadRequest("missing 'date' or 'dir'".to_string()));
    };
    let date = parse_date(raw)?;

    let target = match dir {
        "prev" => state.store.prev_date(&date).await?,
        "next" => state.store.next_date(&date).await?,
        other => {
            return Err(ApiError::BadRequest(format!(
                "invalid dir '{other}', expected prev or next"
            )))
        }
    };

    target
        .map(|date| Json(NavigateOut { date }))
        .ok_or_else(|| ApiError::NotFound("no more data".to_string()))
}
