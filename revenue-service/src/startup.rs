//! Application startup and lifecycle management.

use crate::config::RevenueConfig;
use crate::handlers::{health, import, simulations};
use crate::services::{
    Database, MockRecapMailer, MonthlyImportJob, RecapSender, RevenueProvider, RevenueStore,
    ShopifyClient, SmtpRecapMailer, StripeClient,
};
use axum::{Router, middleware, routing::get, routing::post};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use service_core::utils::TokenSealer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: RevenueConfig,
    pub store: Arc<dyn RevenueStore>,
    pub job: Arc<MonthlyImportJob>,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application against Postgres and the real providers.
    pub async fn build(config: RevenueConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await?;

        db.run_migrations().await?;
        db.verify_schema().await?;

        let sealer = TokenSealer::from_base64_key(config.token_sealing_key.expose_secret())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("TOKEN_SEALING_KEY: {}", e)))?;

        let timeout = Duration::from_secs(config.providers.timeout_secs);
        let stripe = StripeClient::new(config.providers.stripe_base_url.clone(), timeout)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Stripe client: {}", e)))?;
        let shopify = ShopifyClient::new(config.providers.shopify_api_version.clone(), timeout)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Shopify client: {}", e)))?;
        let providers: Vec<Arc<dyn RevenueProvider>> =
            vec![Arc::new(stripe), Arc::new(shopify)];

        let mailer: Arc<dyn RecapSender> = if config.smtp.enabled {
            match SmtpRecapMailer::new(config.smtp.clone()) {
                Ok(mailer) => {
                    tracing::info!("SMTP recap mailer initialized");
                    Arc::new(mailer)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP mailer: {}. Using mock.", e);
                    Arc::new(MockRecapMailer::new())
                }
            }
        } else {
            tracing::info!("SMTP disabled, using mock recap mailer");
            Arc::new(MockRecapMailer::new())
        };

        let db = Arc::new(db);
        let job = MonthlyImportJob::new(
            db.clone(),
            db.clone(),
            providers,
            mailer,
            sealer,
        );

        let state = AppState {
            config,
            store: db,
            job: Arc::new(job),
        };

        Self::bind(state).await
    }

    /// Build with injected collaborators. Used by tests to run against
    /// in-memory doubles.
    pub async fn build_with_state(state: AppState) -> Result<Self, AppError> {
        Self::bind(state).await
    }

    async fn bind(state: AppState) -> Result<Self, AppError> {
        // Port 0 = random port for testing.
        let addr: SocketAddr = format!(
            "{}:{}",
            state.config.common.host, state.config.common.port
        )
        .parse()
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid bind address: {}", e)))?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Revenue service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Serve until the task is cancelled or the listener fails.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);
        axum::serve(self.listener, router).await
    }
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route(
            "/internal/jobs/monthly-import",
            get(import::trigger_monthly_import),
        )
        .route("/api/v1/simulations", post(simulations::simulate))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
