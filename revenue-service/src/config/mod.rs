//! Configuration module for revenue-service.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone)]
pub struct RevenueConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    /// Shared secret the scheduler presents to trigger the monthly job.
    pub cron_secret: Secret<String>,
    /// Base64-encoded 32-byte AES key sealing provider tokens at rest.
    pub token_sealing_key: Secret<String>,
    pub providers: ProviderConfig,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub stripe_base_url: String,
    pub shopify_api_version: String,
    /// Per-request timeout for provider calls, deployment-tunable.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
}

impl SmtpConfig {
    /// A disabled block, for local runs and tests without a relay.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: 587,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "no-reply@comptalyze.fr".to_string(),
            from_name: "Comptalyze".to_string(),
        }
    }
}

impl RevenueConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "revenue-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            cron_secret: env::var("CRON_SECRET").map(Secret::new).map_err(|_| {
                AppError::ConfigError(anyhow::anyhow!("CRON_SECRET is required"))
            })?,
            token_sealing_key: env::var("TOKEN_SEALING_KEY").map(Secret::new).map_err(
                |_| AppError::ConfigError(anyhow::anyhow!("TOKEN_SEALING_KEY is required")),
            )?,
            providers: ProviderConfig {
                stripe_base_url: env::var("STRIPE_BASE_URL")
                    .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
                shopify_api_version: env::var("SHOPIFY_API_VERSION")
                    .unwrap_or_else(|_| "2024-01".to_string()),
                timeout_secs: env::var("PROVIDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            smtp: SmtpConfig {
                enabled: env::var("SMTP_ENABLED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
                host: env::var("SMTP_HOST").unwrap_or_default(),
                port: env::var("SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                user: env::var("SMTP_USER").unwrap_or_default(),
                password: Secret::new(env::var("SMTP_PASSWORD").unwrap_or_default()),
                from_email: env::var("SMTP_FROM_EMAIL")
                    .unwrap_or_else(|_| "no-reply@comptalyze.fr".to_string()),
                from_name: env::var("SMTP_FROM_NAME")
                    .unwrap_or_else(|_| "Comptalyze".to_string()),
            },
        })
    }
}
