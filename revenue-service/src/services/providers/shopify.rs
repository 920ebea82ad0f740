//! Shopify commerce-platform client.
//!
//! Lists orders for a shop over a date range and sums the financially
//! settled ones. The credential's `account_id` is the shop domain
//! (e.g. `ma-boutique.myshopify.com`); order totals arrive as decimal
//! strings in the shop currency.

use super::{ProviderError, RevenueProvider};
use crate::models::{ImportPeriod, ProviderTotal};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

const PAGE_LIMIT: u32 = 250;

#[derive(Clone)]
pub struct ShopifyClient {
    client: Client,
    api_version: String,
}

#[derive(Debug, Deserialize)]
struct OrderList {
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: i64,
    total_price: String,
    financial_status: Option<String>,
}

impl Order {
    /// Only financially settled orders count as revenue.
    fn is_settled(&self) -> bool {
        matches!(
            self.financial_status.as_deref(),
            Some("paid") | Some("partially_refunded")
        )
    }
}

impl ShopifyClient {
    pub fn new(api_version: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_version,
        })
    }

    async fn fetch_page(
        &self,
        shop_domain: &str,
        access_token: &str,
        period: &ImportPeriod,
        since_id: Option<i64>,
    ) -> Result<OrderList, ProviderError> {
        let url = format!(
            "https://{}/admin/api/{}/orders.json",
            shop_domain, self.api_version
        );

        let mut query = vec![
            ("status", "any".to_string()),
            ("created_at_min", period.start().to_rfc3339()),
            ("created_at_max", period.end_inclusive().to_rfc3339()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }

        let response = self
            .client
            .get(url)
            .header("X-Shopify-Access-Token", access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Shopify request failed: {}", e)))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::Authentication(
                    "Shopify rejected the access token".to_string(),
                ));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(ProviderError::RateLimited(
                    "Shopify rate limit hit".to_string(),
                ));
            }
            status if !status.is_success() => {
                return Err(ProviderError::FetchFailed(format!(
                    "Shopify returned {}",
                    status
                )));
            }
            _ => {}
        }

        response
            .json::<OrderList>()
            .await
            .map_err(|e| ProviderError::FetchFailed(format!("Invalid Shopify response: {}", e)))
    }
}

#[async_trait]
impl RevenueProvider for ShopifyClient {
    fn name(&self) -> &'static str {
        "shopify"
    }

    async fn fetch_month_total(
        &self,
        account_id: &str,
        access_token: &str,
        period: &ImportPeriod,
    ) -> Result<ProviderTotal, ProviderError> {
        let mut total = Decimal::ZERO;
        let mut count: u32 = 0;
        let mut since_id: Option<i64> = None;

        loop {
            let page = self
                .fetch_page(account_id, access_token, period, since_id)
                .await?;

            for order in &page.orders {
                if order.is_settled() {
                    let amount = Decimal::from_str(&order.total_price).map_err(|_| {
                        ProviderError::FetchFailed(format!(
                            "Unparseable order total: {}",
                            order.total_price
                        ))
                    })?;
                    total += amount;
                    count += 1;
                }
            }

            if page.orders.len() < PAGE_LIMIT as usize {
                break;
            }
            match page.orders.last() {
                Some(last) => since_id = Some(last.id),
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
    fn order_list_parses_shopify_shape() {
        let body = r#"{
            "orders": [
                {"id": 101, "total_price": "49.90", "financial_status": "paid"},
                {"id": 102, "total_price": "15.00", "financial_status": "pending"},
                {"id": 103, "total_price": "30.00", "financial_status": "partially_refunded"},
                {"id": 104, "total_price": "12.00", "financial_status": null}
            ]
        }"#;

        let list: OrderList = serde_json::from_str(body).unwrap();
        assert_eq!(list.orders.len(), 4);

        let settled: Vec<_> = list.orders.iter().filter(|o| o.is_settled()).collect();
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].id, 101);
        assert_eq!(settled[1].id, 103);
    }
}
