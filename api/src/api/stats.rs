use axum::extract::State;
use serde::Serialize;

use crate::app::App;
use crate::error::AppError;
use crate::json::Json;
use crate::store::{UsageSummaryRow, UsageTotals};

#[derive(Serialize)]
pub struct StatsResponse {
    pub status_counts: Vec<(String, i64)>,
    pub total_story_count: i64,
}

pub async fn get_stats(State(app): State<App>) -> Result<Json<StatsResponse>, AppError> {
    let status_counts = crate::store::run_blocking(&app.store, |store| store.status_counts()).await?;
    let total_story_count =
        crate::store::run_blocking(&app.store, |store| store.total_story_count()).await?;
    Ok(Json(StatsResponse {
        status_counts,
        total_story_count,
    }))
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub totals: UsageTotals,
    pub summary: Vec<UsageSummaryRow>,
}

pub async fn get_usage(State(app): State<App>) -> Result<Json<UsageResponse>, AppError> {
    let totals = crate::store::run_blocking(&app.store, |store| store.usage_totals()).await?;
    let summary = crate::store::run_blocking(&app.store, |store| store.usage_summary()).await?;
    Ok(Json(UsageResponse { totals, summary }))
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub rate_limit_until: i64,
    pub quota_exceeded_until: i64,
    pub content_workers: usize,
    pub renderer_configured: bool,
}

pub async fn get_status(State(app): State<App>) -> Result<Json<StatusResponse>, AppError> {
    Ok(Json(StatusResponse {
        rate_limit_until: app.renderer_gate.rate_limit_until(),
        quota_exceeded_until: app.renderer_gate.quota_exceeded_until(),
        content_workers: app.config.content_workers,
        renderer_configured: app.config.renderer.is_some(),
    }))
}
