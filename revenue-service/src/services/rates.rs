//! URSSAF reference rates and VAT franchise thresholds per activity category.
//!
//! Values are the micro-entrepreneur flat rates: cotisation rate applied to
//! gross revenue, versement libératoire withholding rate, and the franchise
//! de TVA base / increased thresholds in euros.

use crate::models::{ActivityCategory, VatStatus};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateProfile {
    /// Social contribution rate on gross revenue, in [0, 1].
    pub contribution_rate: Decimal,
    /// Versement libératoire rate on gross revenue, in [0, 1].
    pub withholding_rate: Decimal,
    /// Franchise de TVA base threshold (annual revenue, EUR).
    pub vat_base_threshold: Decimal,
    /// Franchise de TVA increased threshold (annual revenue, EUR).
    pub vat_increased_threshold: Decimal,
}

pub fn rate_profile(category: ActivityCategory) -> RateProfile {
    match category {
        ActivityCategory::SaleOfGoods => RateProfile {
            contribution_rate: Decimal::new(123, 3),  // 12.3 %
            withholding_rate: Decimal::new(10, 3),    // 1.0 %
            vat_base_threshold: Decimal::new(91_900, 0),
            vat_increased_threshold: Decimal::new(101_000, 0),
        },
        ActivityCategory::Services => RateProfile {
            contribution_rate: Decimal::new(212, 3),  // 21.2 %
            withholding_rate: Decimal::new(17, 3),    // 1.7 %
            vat_base_threshold: Decimal::new(36_800, 0),
            vat_increased_threshold: Decimal::new(39_100, 0),
        },
        ActivityCategory::LiberalProfession => RateProfile {
            contribution_rate: Decimal::new(211, 3),  // 21.1 %
            withholding_rate: Decimal::new(22, 3),    // 2.2 %
            vat_base_threshold: Decimal::new(36_800, 0),
            vat_increased_threshold: Decimal::new(39_100, 0),
        },
    }
}

/// Classify a cumulative year-to-date revenue against the franchise
/// thresholds of the category.
pub fn vat_status(category: ActivityCategory, ytd_revenue: Decimal) -> VatStatus {
    let rates = rate_profile(category);
    if ytd_revenue > rates.vat_increased_threshold {
        VatStatus::OverIncreasedThreshold
    } else if ytd_revenue > rates.vat_base_threshold {
        VatStatus::OverBaseThreshold
    } else {
        VatStatus::WithinFranchise
    }
}
