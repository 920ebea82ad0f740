pub mod shopify;
pub mod stripe;

use crate::models::{ImportPeriod, ProviderTotal};
use async_trait::async_trait;
use thiserror::Error;

pub use shopify::ShopifyClient;
pub use stripe::StripeClient;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),
}

/// One linked billing/commerce backend the job can pull a month of revenue
/// from. A fetch failure only fails its own unit of work.
#[async_trait]
pub trait RevenueProvider: Send + Sync {
    /// Stable provider name; doubles as the revenue record `source`.
    fn name(&self) -> &'static str;

    /// Sum the settled transactions of `account_id` over `period`, in major
    /// currency units (euros).
    async fn fetch_month_total(
        &self,
        account_id: &str,
        access_token: &str,
        period: &ImportPeriod,
    ) -> Result<ProviderTotal, ProviderError>;
}
