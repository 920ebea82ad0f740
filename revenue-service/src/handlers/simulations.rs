//! The contribution/tax calculator endpoint backing the product's simulator.

use crate::models::{ActivityCategory, ComputationResult, TaxMode, VatStatus};
use crate::services::computation::{ComputeError, compute_month};
use crate::services::rates::vat_status;
use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use validator::Validate;

use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct SimulationRequest {
    pub revenue: Decimal,
    #[validate(length(min = 1, message = "Activity cannot be empty"))]
    pub activity: String,
    pub tax_mode: TaxMode,
    /// Required when `tax_mode` is `progressive_provision`; within [0, 0.20].
    pub provision_rate: Option<Decimal>,
    /// Cumulative revenue for the calendar year, for VAT franchise tracking.
    pub ytd_revenue: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub activity: ActivityCategory,
    pub tax_mode: TaxMode,
    #[serde(flatten)]
    pub result: ComputationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vat_status: Option<VatStatus>,
}

impl From<ComputeError> for AppError {
    fn from(err: ComputeError) -> Self {
        AppError::BadRequest(anyhow::anyhow!(err))
    }
}

#[tracing::instrument(skip(_state, request))]
pub async fn simulate(
    State(_state): State<AppState>,
    Json(request): Json<SimulationRequest>,
) -> Result<Json<SimulationResponse>, AppError> {
    request.validate()?;

    let category = ActivityCategory::parse(&request.activity)
        .ok_or_else(|| ComputeError::UnknownActivity(request.activity.clone()))?;

    let result = compute_month(
        request.revenue,
        category,
        request.tax_mode,
        request.provision_rate,
    )?;

    let vat = request
        .ytd_revenue
        .map(|ytd| vat_status(category, ytd));

    Ok(Json(SimulationResponse {
        activity: category,
        tax_mode: request.tax_mode,
        result,
        vat_status: vat,
    }))
}
