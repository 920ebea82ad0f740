//! Domain models for revenue-service.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Activity & Tax Reference
// ============================================================================

/// Micro-entrepreneur activity category. Immutable reference data (rates,
/// thresholds) hangs off this in `services::rates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    SaleOfGoods,
    Services,
    LiberalProfession,
}

impl ActivityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaleOfGoods => "sale_of_goods",
            Self::Services => "services",
            Self::LiberalProfession => "liberal_profession",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sale_of_goods" => Some(Self::SaleOfGoods),
            "services" => Some(Self::Services),
            "liberal_profession" => Some(Self::LiberalProfession),
            _ => None,
        }
    }
}

/// Income-tax handling selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxMode {
    /// No provision; tax handled entirely outside the tool.
    None,
    /// Versement libératoire: flat withholding on gross revenue.
    FlatRateWithholding,
    /// Provision for progressive brackets, as a rate on net revenue.
    ProgressiveProvision,
}

impl TaxMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::FlatRateWithholding => "flat_rate_withholding",
            Self::ProgressiveProvision => "progressive_provision",
        }
    }
}

/// Position relative to the VAT franchise thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VatStatus {
    WithinFranchise,
    OverBaseThreshold,
    OverIncreasedThreshold,
}

/// Derived amounts for one month. Never persisted as-is; full precision,
/// rounding is the caller's presentation concern.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputationResult {
    pub contribution: Decimal,
    pub tax_provision: Decimal,
    pub net_after_contributions: Decimal,
    pub net_after_all: Decimal,
}

// ============================================================================
// Persisted Entities
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub email: String,
    pub activity: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct IntegrationCredential {
    pub credential_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token_sealed: String,
    pub account_id: String,
    pub active: bool,
    pub connected_utc: DateTime<Utc>,
    pub last_synced_utc: Option<DateTime<Utc>>,
}

/// One user's revenue for one (year, month), declared or imported.
/// At most one row per (user, year, month, source, external_id).
#[derive(Debug, Clone, FromRow)]
pub struct MonthlyRevenueRecord {
    pub record_id: Uuid,
    pub user_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub gross_amount: Decimal,
    pub activity: String,
    pub contribution_amount: Decimal,
    pub net_amount: Decimal,
    pub source: String,
    pub external_id: String,
    pub metadata: serde_json::Value,
    pub created_utc: DateTime<Utc>,
}

/// Insert payload for a revenue record.
#[derive(Debug, Clone)]
pub struct NewRevenueRecord {
    pub user_id: Uuid,
    pub year: i32,
    pub month: u32,
    pub gross_amount: Decimal,
    pub activity: ActivityCategory,
    pub contribution_amount: Decimal,
    pub net_amount: Decimal,
    pub source: String,
    pub external_id: String,
    pub metadata: serde_json::Value,
}

/// Append-only audit row for one import unit of work.
#[derive(Debug, Clone, FromRow)]
pub struct ImportLog {
    pub log_id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub status: String,
    pub imported_count: i32,
    pub total: Decimal,
    pub error_message: Option<String>,
    pub period: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImportLog {
    pub user_id: Uuid,
    pub provider: String,
    pub status: ImportStatus,
    pub imported_count: i32,
    pub total: Decimal,
    pub error_message: Option<String>,
    pub period: String,
}

/// Terminal state of one user-provider-period unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Persisted,
    SkippedDuplicate,
    SkippedNoEntitlement,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Persisted => "persisted",
            Self::SkippedDuplicate => "skipped_duplicate",
            Self::SkippedNoEntitlement => "skipped_no_entitlement",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "persisted" => Self::Persisted,
            "skipped_duplicate" => Self::SkippedDuplicate,
            "skipped_no_entitlement" => Self::SkippedNoEntitlement,
            _ => Self::Failed,
        }
    }
}

// ============================================================================
// Import Period
// ============================================================================

/// A calendar month targeted by the reconciliation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportPeriod {
    year: i32,
    month: u32,
}

impl ImportPeriod {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) || !(2000..=2200).contains(&year) {
            return None;
        }
        Some(Self { year, month })
    }

    /// The calendar month before `now`. The job targets this by default.
    pub fn previous_month(now: DateTime<Utc>) -> Self {
        if now.month() == 1 {
            Self { year: now.year() - 1, month: 12 }
        } else {
            Self { year: now.year(), month: now.month() - 1 }
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// First instant of the month, UTC.
    pub fn start(&self) -> DateTime<Utc> {
        // year/month are validated at construction, so this is unambiguous
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
            .expect("validated period")
    }

    /// First instant of the following month, UTC.
    pub fn end_exclusive(&self) -> DateTime<Utc> {
        let (year, month) = if self.month == 12 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 1)
        };
        Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .single()
            .expect("validated period")
    }

    /// Last inclusive instant of the month at second precision, for
    /// providers whose range filters are inclusive.
    pub fn end_inclusive(&self) -> DateTime<Utc> {
        self.end_exclusive() - Duration::seconds(1)
    }

    /// Stable label, e.g. `2025-07`. Used in external ids and audit rows.
    pub fn label(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// Human label for recap mails, e.g. `juillet 2025`.
    pub fn label_fr(&self) -> String {
        let name = match self.month {
            1 => "janvier",
            2 => "février",
            3 => "mars",
            4 => "avril",
            5 => "mai",
            6 => "juin",
            7 => "juillet",
            8 => "août",
            9 => "septembre",
            10 => "octobre",
            11 => "novembre",
            _ => "décembre",
        };
        format!("{} {}", name, self.year)
    }
}

// ============================================================================
// Job Results
// ============================================================================

/// What a provider fetch yielded for one account over one period.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTotal {
    pub total: Decimal,
    pub transaction_count: u32,
}

/// Aggregate counts for one job invocation, returned to the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub users_processed: u32,
    pub imported: u32,
    pub skipped_duplicates: u32,
    pub skipped_no_entitlement: u32,
    pub failed: u32,
    pub emails_sent: u32,
}

/// Per-source line of a recap mail.
#[derive(Debug, Clone)]
pub struct RecapLine {
    pub source: String,
    pub total: Decimal,
    pub transaction_count: u32,
}

/// Recap mail payload handed to the mail collaborator.
#[derive(Debug, Clone)]
pub struct MonthlyRecap {
    pub to: String,
    pub period_label: String,
    pub total: Decimal,
    pub lines: Vec<RecapLine>,
}
