//! Postgres-backed store for revenue-service.

use crate::models::{
    IntegrationCredential, MonthlyRevenueRecord, NewImportLog, NewRevenueRecord, UserProfile,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{EntitlementChecker, InsertOutcome, RevenueStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

/// Tables the service requires. Checked once at startup; a missing table is
/// a deployment error, not a per-request condition.
const REQUIRED_TABLES: &[&str] = &[
    "user_profiles",
    "premium_entitlements",
    "integration_credentials",
    "monthly_revenue_records",
    "import_logs",
];

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn query_err(e: sqlx::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "revenue-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Verify every required table exists. Fails fast with a configuration
    /// error so schema drift surfaces at deploy time.
    #[instrument(skip(self))]
    pub async fn verify_schema(&self) -> Result<(), AppError> {
        let mut missing = Vec::new();

        for table in REQUIRED_TABLES {
            let found: Option<String> =
                sqlx::query_scalar("SELECT to_regclass($1)::text")
                    .bind(table)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!("Schema probe failed: {}", e))
                    })?;

            if found.is_none() {
                missing.push(*table);
            }
        }

        if !missing.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Schema missing tables: {}",
                missing.join(", ")
            )));
        }

        info!("Schema verified, all required tables present");
        Ok(())
    }
}

#[async_trait]
impl RevenueStore for Database {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_active_integrations(&self) -> Result<Vec<IntegrationCredential>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_integrations"])
            .start_timer();

        let credentials = sqlx::query_as::<_, IntegrationCredential>(
            r#"
            SELECT credential_id, user_id, provider, access_token_sealed, account_id, active, connected_utc, last_synced_utc
            FROM integration_credentials
            WHERE active = TRUE
            ORDER BY user_id, provider
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();
        Ok(credentials)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["user_profile"])
            .start_timer();

        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT user_id, email, activity FROM user_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();
        Ok(profile)
    }

    #[instrument(skip(self), fields(user_id = %user_id, source = %source))]
    async fn find_revenue_record(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
        source: &str,
    ) -> Result<Option<MonthlyRevenueRecord>, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_revenue_record"])
            .start_timer();

        let record = sqlx::query_as::<_, MonthlyRevenueRecord>(
            r#"
            SELECT record_id, user_id, year, month, gross_amount, activity, contribution_amount, net_amount, source, external_id, metadata, created_utc
            FROM monthly_revenue_records
            WHERE user_id = $1 AND year = $2 AND month = $3 AND source = $4
            "#,
        )
        .bind(user_id)
        .bind(year)
        .bind(month as i32)
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();
        Ok(record)
    }

    #[instrument(skip(self, record), fields(user_id = %record.user_id, source = %record.source))]
    async fn insert_revenue_record(
        &self,
        record: NewRevenueRecord,
    ) -> Result<InsertOutcome, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_revenue_record"])
            .start_timer();

        // The unique index is the serialization point for concurrent runs;
        // DO NOTHING turns a lost race into a skip.
        let result = sqlx::query(
            r#"
            INSERT INTO monthly_revenue_records
                (record_id, user_id, year, month, gross_amount, activity, contribution_amount, net_amount, source, external_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (user_id, year, month, source, external_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.year)
        .bind(record.month as i32)
        .bind(record.gross_amount)
        .bind(record.activity.as_str())
        .bind(record.contribution_amount)
        .bind(record.net_amount)
        .bind(&record.source)
        .bind(&record.external_id)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Ok(InsertOutcome::DuplicateSkipped);
        }

        info!(
            user_id = %record.user_id,
            source = %record.source,
            "Revenue record persisted"
        );
        Ok(InsertOutcome::Inserted)
    }

    #[instrument(skip(self, log), fields(user_id = %log.user_id, provider = %log.provider))]
    async fn append_import_log(&self, log: NewImportLog) -> Result<(), StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["append_import_log"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO import_logs (log_id, user_id, provider, status, imported_count, total, error_message, period)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(log.user_id)
        .bind(&log.provider)
        .bind(log.status.as_str())
        .bind(log.imported_count)
        .bind(log.total)
        .bind(&log.error_message)
        .bind(&log.period)
        .execute(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_synced(
        &self,
        credential_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE integration_credentials SET last_synced_utc = $2 WHERE credential_id = $1")
            .bind(credential_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(query_err)?;
        Ok(())
    }
}

#[async_trait]
impl EntitlementChecker for Database {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn has_premium(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["has_premium"])
            .start_timer();

        let entitled: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM premium_entitlements
                WHERE user_id = $1
                  AND active = TRUE
                  AND (valid_until IS NULL OR valid_until > now())
            )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(query_err)?;

        timer.observe_duration();
        Ok(entitled)
    }
}
