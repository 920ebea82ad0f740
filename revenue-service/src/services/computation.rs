//! The month computation: gross revenue in, contribution / tax provision /
//! net amounts out. Pure and deterministic; all arithmetic is `Decimal`, so
//! `contribution + net_after_contributions == revenue` holds exactly.

use crate::models::{ActivityCategory, ComputationResult, TaxMode};
use crate::services::rates::rate_profile;
use rust_decimal::Decimal;
use thiserror::Error;

/// Upper bound for the progressive-bracket provision rate (20 %).
const MAX_PROVISION_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown activity category: {0}")]
    UnknownActivity(String),
}

/// Compute the derived amounts for one month of revenue.
///
/// `provision_rate` is required for `TaxMode::ProgressiveProvision` and must
/// lie in [0, 0.20]; out-of-range values are rejected, not clamped. This is
/// the single validation boundary for the rate.
pub fn compute_month(
    revenue: Decimal,
    category: ActivityCategory,
    tax_mode: TaxMode,
    provision_rate: Option<Decimal>,
) -> Result<ComputationResult, ComputeError> {
    if revenue < Decimal::ZERO {
        return Err(ComputeError::InvalidInput(format!(
            "revenue must be non-negative, got {}",
            revenue
        )));
    }

    let rates = rate_profile(category);
    let contribution = revenue * rates.contribution_rate;
    let net_after_contributions = revenue - contribution;

    let tax_provision = match tax_mode {
        TaxMode::None => Decimal::ZERO,
        TaxMode::FlatRateWithholding => revenue * rates.withholding_rate,
        TaxMode::ProgressiveProvision => {
            let rate = provision_rate.ok_or_else(|| {
                ComputeError::InvalidInput(
                    "provision_rate is required for progressive_provision".to_string(),
                )
            })?;
            if rate < Decimal::ZERO || rate > MAX_PROVISION_RATE {
                return Err(ComputeError::InvalidInput(format!(
                    "provision_rate must be within [0, 0.20], got {}",
                    rate
                )));
            }
            net_after_contributions * rate
        }
    };

    Ok(ComputationResult {
        contribution,
        tax_provision,
        net_after_contributions,
        net_after_all: net_after_contributions - tax_provision,
    })
}
