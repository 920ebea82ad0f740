//! Common test utilities: in-memory collaborator doubles wired through the
//! job's trait seams, plus an HTTP harness spawning the app on a random port.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use revenue_service::config::{DatabaseConfig, ProviderConfig, RevenueConfig, SmtpConfig};
use revenue_service::models::{
    ImportPeriod, ImportLog, IntegrationCredential, MonthlyRecap, MonthlyRevenueRecord,
    NewImportLog, NewRevenueRecord, ProviderTotal, UserProfile,
};
use revenue_service::services::recap::{MailError, RecapSender};
use revenue_service::services::{
    EntitlementChecker, InsertOutcome, MonthlyImportJob, ProviderError, RevenueProvider,
    RevenueStore, StoreError,
};
use revenue_service::startup::{AppState, Application};
use rust_decimal::Decimal;
use secrecy::Secret;
use service_core::config::Config as CommonConfig;
use service_core::utils::TokenSealer;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,revenue_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn test_sealer() -> TokenSealer {
    TokenSealer::from_base64_key(&BASE64.encode([42u8; 32])).expect("test sealing key")
}

// ============================================================================
// In-memory store double
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub integrations: Mutex<Vec<IntegrationCredential>>,
    pub profiles: Mutex<HashMap<Uuid, UserProfile>>,
    pub records: Mutex<Vec<MonthlyRevenueRecord>>,
    pub logs: Mutex<Vec<ImportLog>>,
    /// Users whose inserts should fail, to simulate persistence errors.
    pub fail_insert_users: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, user_id: Uuid, email: &str, activity: &str) {
        self.profiles.lock().unwrap().insert(
            user_id,
            UserProfile {
                user_id,
                email: email.to_string(),
                activity: activity.to_string(),
            },
        );
    }

    pub fn add_integration(&self, user_id: Uuid, provider: &str, sealed_token: &str) -> Uuid {
        let credential_id = Uuid::new_v4();
        self.integrations.lock().unwrap().push(IntegrationCredential {
            credential_id,
            user_id,
            provider: provider.to_string(),
            access_token_sealed: sealed_token.to_string(),
            account_id: format!("acct-{}", provider),
            active: true,
            connected_utc: Utc::now(),
            last_synced_utc: None,
        });
        credential_id
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn logs_with_status(&self, status: &str) -> Vec<ImportLog> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == status)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RevenueStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_active_integrations(&self) -> Result<Vec<IntegrationCredential>, StoreError> {
        Ok(self
            .integrations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.active)
            .cloned()
            .collect())
    }

    async fn user_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_revenue_record(
        &self,
        user_id: Uuid,
        year: i32,
        month: u32,
        source: &str,
    ) -> Result<Option<MonthlyRevenueRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.user_id == user_id
                    && r.year == year
                    && r.month == month as i32
                    && r.source == source
            })
            .cloned())
    }

    async fn insert_revenue_record(
        &self,
        record: NewRevenueRecord,
    ) -> Result<InsertOutcome, StoreError> {
        if self
            .fail_insert_users
            .lock()
            .unwrap()
            .contains(&record.user_id)
        {
            return Err(StoreError::Query("simulated insert failure".to_string()));
        }

        let mut records = self.records.lock().unwrap();
        let duplicate = records.iter().any(|r| {
            r.user_id == record.user_id
                && r.year == record.year
                && r.month == record.month as i32
                && r.source == record.source
                && r.external_id == record.external_id
        });
        if duplicate {
            return Ok(InsertOutcome::DuplicateSkipped);
        }

        records.push(MonthlyRevenueRecord {
            record_id: Uuid::new_v4(),
            user_id: record.user_id,
            year: record.year,
            month: record.month as i32,
            gross_amount: record.gross_amount,
            activity: record.activity.as_str().to_string(),
            contribution_amount: record.contribution_amount,
            net_amount: record.net_amount,
            source: record.source,
            external_id: record.external_id,
            metadata: record.metadata,
            created_utc: Utc::now(),
        });
        Ok(InsertOutcome::Inserted)
    }

    async fn append_import_log(&self, log: NewImportLog) -> Result<(), StoreError> {
        self.logs.lock().unwrap().push(ImportLog {
            log_id: Uuid::new_v4(),
            user_id: log.user_id,
            provider: log.provider,
            status: log.status.as_str().to_string(),
            imported_count: log.imported_count,
            total: log.total,
            error_message: log.error_message,
            period: log.period,
            created_utc: Utc::now(),
        });
        Ok(())
    }

    async fn mark_synced(
        &self,
        credential_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        for credential in self.integrations.lock().unwrap().iter_mut() {
            if credential.credential_id == credential_id {
                credential.last_synced_utc = Some(at);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Entitlement double
// ============================================================================

#[derive(Default)]
pub struct StaticEntitlements {
    pub premium_users: Mutex<HashSet<Uuid>>,
}

impl StaticEntitlements {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn grant(&self, user_id: Uuid) {
        self.premium_users.lock().unwrap().insert(user_id);
    }
}

#[async_trait]
impl EntitlementChecker for StaticEntitlements {
    async fn has_premium(&self, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.premium_users.lock().unwrap().contains(&user_id))
    }
}

// ============================================================================
// Provider double
// ============================================================================

pub enum FakeFetch {
    Total(Decimal, u32),
    Fail(String),
}

pub struct FakeProvider {
    name: &'static str,
    fetch: FakeFetch,
    /// (account_id, access_token, period label) per call.
    pub calls: Mutex<Vec<(String, String, String)>>,
}

impl FakeProvider {
    pub fn totaling(name: &'static str, total: &str, count: u32) -> Arc<Self> {
        Arc::new(Self {
            name,
            fetch: FakeFetch::Total(total.parse().unwrap(), count),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(name: &'static str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            name,
            fetch: FakeFetch::Fail(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl RevenueProvider for FakeProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_month_total(
        &self,
        account_id: &str,
        access_token: &str,
        period: &ImportPeriod,
    ) -> Result<ProviderTotal, ProviderError> {
        self.calls.lock().unwrap().push((
            account_id.to_string(),
            access_token.to_string(),
            period.label(),
        ));
        match &self.fetch {
            FakeFetch::Total(total, count) => Ok(ProviderTotal {
                total: *total,
                transaction_count: *count,
            }),
            FakeFetch::Fail(message) => Err(ProviderError::FetchFailed(message.clone())),
        }
    }
}

// ============================================================================
// Mailer double
// ============================================================================

#[derive(Default)]
pub struct RecordingMailer {
    pub recaps: Mutex<Vec<MonthlyRecap>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            recaps: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<MonthlyRecap> {
        self.recaps.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecapSender for RecordingMailer {
    async fn send_recap(&self, recap: &MonthlyRecap) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::SendFailed("simulated SMTP outage".to_string()));
        }
        self.recaps.lock().unwrap().push(recap.clone());
        Ok(())
    }
}

// ============================================================================
// Job and app harness
// ============================================================================

pub const TEST_CRON_SECRET: &str = "test-cron-secret";

pub fn test_config() -> RevenueConfig {
    RevenueConfig {
        common: CommonConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service_name: "revenue-service-test".to_string(),
        service_version: "test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 2,
            min_connections: 1,
        },
        cron_secret: Secret::new(TEST_CRON_SECRET.to_string()),
        token_sealing_key: Secret::new(BASE64.encode([42u8; 32])),
        providers: ProviderConfig {
            stripe_base_url: "https://api.stripe.com".to_string(),
            shopify_api_version: "2024-01".to_string(),
            timeout_secs: 5,
        },
        smtp: SmtpConfig::disabled(),
    }
}

pub fn build_job(
    store: Arc<MemoryStore>,
    entitlements: Arc<StaticEntitlements>,
    providers: Vec<Arc<dyn RevenueProvider>>,
    mailer: Arc<dyn RecapSender>,
) -> MonthlyImportJob {
    MonthlyImportJob::new(store, entitlements, providers, mailer, test_sealer())
}

/// Test application wrapper.
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub store: Arc<MemoryStore>,
    pub entitlements: Arc<StaticEntitlements>,
    pub mailer: Arc<RecordingMailer>,
}

/// Spawn the app over in-memory collaborators and the given providers.
pub async fn spawn_app(providers: Vec<Arc<dyn RevenueProvider>>) -> TestApp {
    init_tracing();

    let store = MemoryStore::new();
    let entitlements = StaticEntitlements::new();
    let mailer = RecordingMailer::new();

    let job = build_job(
        store.clone(),
        entitlements.clone(),
        providers,
        mailer.clone(),
    );

    let state = AppState {
        config: test_config(),
        store: store.clone(),
        job: Arc::new(job),
    };

    let app = Application::build_with_state(state)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
        store,
        entitlements,
        mailer,
    }
}
