//! Scheduler-facing trigger for the monthly reconciliation job.

use crate::models::{ImportPeriod, ImportSummary};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::HeaderMap,
    http::header::AUTHORIZATION,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use service_core::utils::{bearer_token, verify_shared_secret};

#[derive(Debug, Deserialize)]
pub struct ImportParams {
    /// Backfill target; both must be given together. Defaults to the
    /// previous calendar month.
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub results: ImportSummary,
}

fn authorize(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing bearer token")))?;

    if !verify_shared_secret(presented, &state.config.cron_secret) {
        return Err(AppError::Unauthorized(anyhow::anyhow!("Invalid secret")));
    }
    Ok(())
}

fn resolve_period(params: &ImportParams) -> Result<ImportPeriod, AppError> {
    match (params.year, params.month) {
        (None, None) => Ok(ImportPeriod::previous_month(Utc::now())),
        (Some(year), Some(month)) => ImportPeriod::new(year, month).ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("Invalid period {}-{}", year, month))
        }),
        _ => Err(AppError::BadRequest(anyhow::anyhow!(
            "year and month must be supplied together"
        ))),
    }
}

#[tracing::instrument(skip(state, headers))]
pub async fn trigger_monthly_import(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ImportParams>,
) -> Result<Json<ImportResponse>, AppError> {
    authorize(&headers, &state)?;

    let period = resolve_period(&params)?;
    let results = state.job.run(period).await?;

    Ok(Json(ImportResponse {
        message: format!("Monthly import completed for {}", period.label()),
        timestamp: Utc::now(),
        results,
    }))
}
