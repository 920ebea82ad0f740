//! Stripe card-processor client.
//!
//! Lists charges over a date range and sums the succeeded ones. Stripe
//! reports amounts in minor units (cents), converted here to euros.

use super::{ProviderError, RevenueProvider};
use crate::models::{ImportPeriod, ProviderTotal};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

const PAGE_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChargeList {
    data: Vec<Charge>,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Charge {
    id: String,
    /// Amount in the smallest currency unit (cents).
    amount: i64,
    status: String,
}

impl StripeClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    async fn fetch_page(
        &self,
        access_token: &str,
        period: &ImportPeriod,
        starting_after: Option<&str>,
    ) -> Result<ChargeList, ProviderError> {
        let mut query = vec![
            ("created[gte]", period.start().timestamp().to_string()),
            ("created[lt]", period.end_exclusive().timestamp().to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = starting_after {
            query.push(("starting_after", cursor.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/v1/charges", self.base_url))
            .basic_auth(access_token, None::<&str>)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Stripe request failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Authentication(
                    "Stripe rejected the API key".to_string(),
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited(
                    "Stripe rate limit hit".to_string(),
                ));
            }
            status if !status.is_success() => {
                return Err(ProviderError::FetchFailed(format!(
                    "Stripe returned {}",
                    status
                )));
            }
            _ => {}
        }

        response
            .json::<ChargeList>()
            .await
            .map_err(|e| ProviderError::FetchFailed(format!("Invalid Stripe response: {}", e)))
    }
}

#[async_trait]
impl RevenueProvider for StripeClient {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn fetch_month_total(
        &self,
        _account_id: &str,
        access_token: &str,
        period: &ImportPeriod,
    ) -> Result<ProviderTotal, ProviderError> {
        let mut total = Decimal::ZERO;
        let mut count: u32 = 0;
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .fetch_page(access_token, period, cursor.as_deref())
                .await?;

            for charge in &page.data {
                if charge.status == "succeeded" {
                    // Minor units to euros, exact.
                    total += Decimal::new(charge.amount, 2);
                    count += 1;
                }
            }

            if !page.has_more {
                break;
            }
            match page.data.last() {
                Some(last) => cursor = Some(last.id.clone()),
                None => break,
            }
        }

        Ok(ProviderTotal {
            total,
            transaction_count: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charge_list_parses_stripe_shape() {
        let body = r#"{
            "object": "list",
            "data": [
                {"id": "ch_1", "amount": 12050, "currency": "eur", "status": "succeeded"},
                {"id": "ch_2", "amount": 900, "currency": "eur", "status": "failed"}
            ],
            "has_more": false
        }"#;

        let list: ChargeList = serde_json::from_str(body).unwrap();
        assert_eq!(list.data.len(), 2);
        assert!(!list.has_more);
        assert_eq!(list.data[0].amount, 12050);
        assert_eq!(list.data[1].status, "failed");
    }

    #[test]
    fn minor_units_convert_exactly() {
        assert_eq!(Decimal::new(12050, 2), "120.50".parse::<Decimal>().unwrap());
        assert_eq!(Decimal::new(1, 2), "0.01".parse::<Decimal>().unwrap());
    }
}
