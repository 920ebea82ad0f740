pub mod computation;
pub mod database;
pub mod import_job;
pub mod metrics;
pub mod providers;
pub mod rates;
pub mod recap;
pub mod store;

pub use computation::{ComputeError, compute_month};
pub use database::Database;
pub use import_job::MonthlyImportJob;
pub use metrics::{get_metrics, init_metrics};
pub use providers::{ProviderError, RevenueProvider, ShopifyClient, StripeClient};
pub use rates::{RateProfile, rate_profile, vat_status};
pub use recap::{MailError, MockRecapMailer, RecapSender, SmtpRecapMailer};
pub use store::{EntitlementChecker, InsertOutcome, RevenueStore, StoreError};
