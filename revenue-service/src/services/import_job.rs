//! The monthly revenue reconciliation job.
//!
//! For every user holding an active integration and a premium entitlement,
//! pulls the target month's transactions from each linked provider, persists
//! one aggregated revenue record per user/month/source, and sends a recap
//! mail. Every unit of work (user x provider x period) is isolated: one
//! failing provider or insert never aborts the batch. Re-running the job for
//! the same period is safe; the store's dedup constraint turns replays into
//! skips.

use crate::models::{
    ActivityCategory, ImportPeriod, ImportStatus, ImportSummary, IntegrationCredential,
    MonthlyRecap, NewImportLog, NewRevenueRecord, RecapLine, TaxMode,
};
use crate::services::computation::compute_month;
use crate::services::metrics::{
    record_error, record_import_unit, record_provider_fetch, record_recap_mail,
};
use crate::services::providers::RevenueProvider;
use crate::services::recap::RecapSender;
use crate::services::store::{EntitlementChecker, InsertOutcome, RevenueStore};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use service_core::error::AppError;
use service_core::utils::TokenSealer;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Terminal result of one unit of work.
struct UnitResult {
    status: ImportStatus,
    total: Decimal,
    transaction_count: u32,
    error: Option<String>,
}

impl UnitResult {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            status: ImportStatus::Failed,
            total: Decimal::ZERO,
            transaction_count: 0,
            error: Some(error.into()),
        }
    }
}

pub struct MonthlyImportJob {
    store: Arc<dyn RevenueStore>,
    entitlements: Arc<dyn EntitlementChecker>,
    providers: HashMap<String, Arc<dyn RevenueProvider>>,
    mailer: Arc<dyn RecapSender>,
    sealer: TokenSealer,
}

impl MonthlyImportJob {
    pub fn new(
        store: Arc<dyn RevenueStore>,
        entitlements: Arc<dyn EntitlementChecker>,
        providers: Vec<Arc<dyn RevenueProvider>>,
        mailer: Arc<dyn RecapSender>,
        sealer: TokenSealer,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();

        Self {
            store,
            entitlements,
            providers,
            mailer,
            sealer,
        }
    }

    /// Run one reconciliation pass over `period`.
    ///
    /// Only a failure to list the integrations aborts the run; everything
    /// past that point is per-unit isolated.
    #[instrument(skip(self), fields(period = %period.label()))]
    pub async fn run(&self, period: ImportPeriod) -> Result<ImportSummary, AppError> {
        let integrations = self.store.list_active_integrations().await.map_err(|e| {
            record_error("list_integrations");
            AppError::DatabaseError(anyhow::anyhow!("Failed to list integrations: {}", e))
        })?;

        info!(
            integrations = integrations.len(),
            "Starting monthly import"
        );

        // BTreeMap for a deterministic processing order across runs.
        let mut by_user: BTreeMap<Uuid, Vec<IntegrationCredential>> = BTreeMap::new();
        for credential in integrations {
            by_user.entry(credential.user_id).or_default().push(credential);
        }

        let mut summary = ImportSummary::default();

        for (user_id, credentials) in by_user {
            summary.users_processed += 1;
            self.process_user(user_id, &credentials, period, &mut summary)
                .await;
        }

        info!(
            users = summary.users_processed,
            imported = summary.imported,
            skipped_duplicates = summary.skipped_duplicates,
            failed = summary.failed,
            "Monthly import finished"
        );
        Ok(summary)
    }

    async fn process_user(
        &self,
        user_id: Uuid,
        credentials: &[IntegrationCredential],
        period: ImportPeriod,
        summary: &mut ImportSummary,
    ) {
        let entitled = match self.entitlements.has_premium(user_id).await {
            Ok(entitled) => entitled,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Entitlement check failed");
                record_error("entitlement_check");
                for credential in credentials {
                    let result = UnitResult::failed(format!("entitlement check failed: {}", e));
                    self.finish_unit(credential, period, &result, summary).await;
                }
                return;
            }
        };

        if !entitled {
            for credential in credentials {
                let result = UnitResult {
                    status: ImportStatus::SkippedNoEntitlement,
                    total: Decimal::ZERO,
                    transaction_count: 0,
                    error: None,
                };
                self.finish_unit(credential, period, &result, summary).await;
            }
            return;
        }

        let profile = match self.store.user_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                for credential in credentials {
                    let result = UnitResult::failed("no user profile");
                    self.finish_unit(credential, period, &result, summary).await;
                }
                return;
            }
            Err(e) => {
                record_error("user_profile");
                for credential in credentials {
                    let result = UnitResult::failed(format!("profile lookup failed: {}", e));
                    self.finish_unit(credential, period, &result, summary).await;
                }
                return;
            }
        };

        let Some(category) = ActivityCategory::parse(&profile.activity) else {
            for credential in credentials {
                let result =
                    UnitResult::failed(format!("unknown activity category: {}", profile.activity));
                self.finish_unit(credential, period, &result, summary).await;
            }
            return;
        };

        let mut recap_lines = Vec::new();
        for credential in credentials {
            let result = self.process_unit(credential, category, period).await;
            if result.status == ImportStatus::Persisted && result.total > Decimal::ZERO {
                recap_lines.push(RecapLine {
                    source: credential.provider.clone(),
                    total: result.total,
                    transaction_count: result.transaction_count,
                });
            }
            self.finish_unit(credential, period, &result, summary).await;
        }

        if recap_lines.is_empty() {
            return;
        }

        let recap = MonthlyRecap {
            to: profile.email.clone(),
            period_label: period.label_fr(),
            total: recap_lines.iter().map(|l| l.total).sum(),
            lines: recap_lines,
        };

        // Best-effort: the persisted records stand even if the mail fails.
        match self.mailer.send_recap(&recap).await {
            Ok(()) => {
                summary.emails_sent += 1;
                record_recap_mail("sent");
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Recap mail failed");
                record_recap_mail("failed");
            }
        }
    }

    async fn process_unit(
        &self,
        credential: &IntegrationCredential,
        category: ActivityCategory,
        period: ImportPeriod,
    ) -> UnitResult {
        let Some(provider) = self.providers.get(&credential.provider) else {
            return UnitResult::failed(format!("unknown provider: {}", credential.provider));
        };

        let access_token = match self.sealer.unseal(&credential.access_token_sealed) {
            Ok(token) => token,
            Err(e) => {
                record_error("token_unseal");
                return UnitResult::failed(format!("token unseal failed: {}", e));
            }
        };

        let fetched = match provider
            .fetch_month_total(&credential.account_id, &access_token, &period)
            .await
        {
            Ok(fetched) => {
                record_provider_fetch(provider.name(), "ok");
                fetched
            }
            Err(e) => {
                record_provider_fetch(provider.name(), "error");
                return UnitResult::failed(format!("fetch failed: {}", e));
            }
        };

        let computed = match compute_month(fetched.total, category, TaxMode::None, None) {
            Ok(computed) => computed,
            Err(e) => return UnitResult::failed(format!("computation failed: {}", e)),
        };

        // Idempotence check before the insert; the unique index remains the
        // backstop for concurrent runs.
        match self
            .store
            .find_revenue_record(
                credential.user_id,
                period.year(),
                period.month(),
                &credential.provider,
            )
            .await
        {
            Ok(Some(_)) => {
                return UnitResult {
                    status: ImportStatus::SkippedDuplicate,
                    total: fetched.total,
                    transaction_count: fetched.transaction_count,
                    error: None,
                };
            }
            Ok(None) => {}
            Err(e) => {
                record_error("find_record");
                return UnitResult::failed(format!("record lookup failed: {}", e));
            }
        }

        let record = NewRevenueRecord {
            user_id: credential.user_id,
            year: period.year(),
            month: period.month(),
            gross_amount: fetched.total,
            activity: category,
            contribution_amount: computed.contribution,
            net_amount: computed.net_after_contributions,
            source: credential.provider.clone(),
            external_id: format!("{}-{}", credential.provider, period.label()),
            metadata: json!({
                "transaction_count": fetched.transaction_count,
                "account_id": credential.account_id,
                "imported_by": "monthly-import",
            }),
        };

        let outcome = match self.store.insert_revenue_record(record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                record_error("insert_record");
                return UnitResult::failed(format!("insert failed: {}", e));
            }
        };

        if let Err(e) = self
            .store
            .mark_synced(credential.credential_id, Utc::now())
            .await
        {
            warn!(credential_id = %credential.credential_id, error = %e, "mark_synced failed");
        }

        let status = match outcome {
            InsertOutcome::Inserted => ImportStatus::Persisted,
            InsertOutcome::DuplicateSkipped => ImportStatus::SkippedDuplicate,
        };

        UnitResult {
            status,
            total: fetched.total,
            transaction_count: fetched.transaction_count,
            error: None,
        }
    }

    /// Record a unit's terminal state: summary counter, metric, audit row.
    async fn finish_unit(
        &self,
        credential: &IntegrationCredential,
        period: ImportPeriod,
        result: &UnitResult,
        summary: &mut ImportSummary,
    ) {
        match result.status {
            ImportStatus::Persisted => summary.imported += 1,
            ImportStatus::SkippedDuplicate => summary.skipped_duplicates += 1,
            ImportStatus::SkippedNoEntitlement => summary.skipped_no_entitlement += 1,
            ImportStatus::Failed => summary.failed += 1,
        }
        record_import_unit(&credential.provider, result.status.as_str());

        if let Some(error) = &result.error {
            warn!(
                user_id = %credential.user_id,
                provider = %credential.provider,
                error = %error,
                "Import unit failed"
            );
        }

        let log = NewImportLog {
            user_id: credential.user_id,
            provider: credential.provider.clone(),
            status: result.status,
            imported_count: result.transaction_count as i32,
            total: result.total,
            error_message: result.error.clone(),
            period: period.label(),
        };

        // The audit trail is best-effort too; losing a log row must not fail
        // the unit it describes.
        if let Err(e) = self.store.append_import_log(log).await {
            warn!(
                user_id = %credential.user_id,
                provider = %credential.provider,
                error = %e,
                "Failed to append import log"
            );
            record_error("append_import_log");
        }
    }
}
