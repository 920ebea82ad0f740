//! Collaborator seams for the reconciliation job.
//!
//! The job only ever talks to these traits; production wires them to the
//! Postgres-backed [`Database`](crate::services::Database), tests substitute
//! in-memory doubles.

use crate::models::{
    IntegrationCredential, MonthlyRevenueRecord, NewImportLog, NewRevenueRecord, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-constraint hit on insert. Success-path skip, not a failure.
    #[error("Duplicate record")]
    Duplicate,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// Result of an idempotent revenue-record insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The dedup constraint rejected the row; an identical record exists.
    DuplicateSkipped,
}

/// Persistence operations the reconciliation job and HTTP surface need.
#[async_trait]
pub trait RevenueStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_active_integrations(&self) -> Result<Vec<IntegrationCredential>, StoreError>;

    async fn user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn find_revenue_record(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
        source: &str,
    ) -> Result<Option<MonthlyRevenueRecord>, StoreError>;

    async fn insert_revenue_record(
        &self,
        record: NewRevenueRecord,
    ) -> Result<InsertOutcome, StoreError>;

    async fn append_import_log(&self, log: NewImportLog) -> Result<(), StoreError>;

    async fn mark_synced(
        &self,
        credential_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Premium entitlement gate, checked once per user per job run.
#[async_trait]
pub trait EntitlementChecker: Send + Sync {
    async fn has_premium(&self, user_id: Uuid) -> Result<bool, StoreError>;
}
