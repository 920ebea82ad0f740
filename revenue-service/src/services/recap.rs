//! Monthly recap mail dispatch.
//!
//! Sent best-effort after a successful import; a mail failure never rolls
//! back the persisted record.

use crate::models::MonthlyRecap;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Mailer not enabled")]
    NotEnabled,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait RecapSender: Send + Sync {
    async fn send_recap(&self, recap: &MonthlyRecap) -> Result<(), MailError>;
}

/// Render the recap body. Plain text; the HTML variant wraps the same lines.
fn render_text(recap: &MonthlyRecap) -> String {
    let mut body = format!(
        "Bonjour,\n\nVotre chiffre d'affaires importé pour {} : {} €.\n\n",
        recap.period_label,
        recap.total.round_dp(2)
    );
    for line in &recap.lines {
        body.push_str(&format!(
            "  - {} : {} € ({} transaction(s))\n",
            line.source,
            line.total.round_dp(2),
            line.transaction_count
        ));
    }
    body.push_str("\nPensez à vérifier votre déclaration URSSAF.\n\n— Comptalyze\n");
    body
}

fn render_html(recap: &MonthlyRecap) -> String {
    let mut rows = String::new();
    for line in &recap.lines {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{} €</td><td>{}</td></tr>",
            line.source,
            line.total.round_dp(2),
            line.transaction_count
        ));
    }
    format!(
        "<p>Bonjour,</p>\
         <p>Votre chiffre d'affaires importé pour <strong>{}</strong> : <strong>{} €</strong>.</p>\
         <table><tr><th>Source</th><th>Total</th><th>Transactions</th></tr>{}</table>\
         <p>Pensez à vérifier votre déclaration URSSAF.</p>\
         <p>— Comptalyze</p>",
        recap.period_label,
        recap.total.round_dp(2),
        rows
    )
}

pub struct SmtpRecapMailer {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpRecapMailer {
    pub fn new(config: SmtpConfig) -> Result<Self, MailError> {
        if !config.enabled {
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let creds = Credentials::new(
            config.user.clone(),
            config.password.expose_secret().clone(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Configuration(format!("Failed to create SMTP relay: {}", e)))?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }
}

#[async_trait]
impl RecapSender for SmtpRecapMailer {
    async fn send_recap(&self, recap: &MonthlyRecap) -> Result<(), MailError> {
        if !self.config.enabled {
            return Err(MailError::NotEnabled);
        }

        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| MailError::Configuration("SMTP transport not initialized".to_string()))?;

        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| MailError::Configuration(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = recap
            .to
            .parse()
            .map_err(|e| MailError::InvalidRecipient(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(format!("Votre récapitulatif Comptalyze — {}", recap.period_label))
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(render_text(recap)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render_html(recap)),
                    ),
            )
            .map_err(|e| MailError::Configuration(format!("Failed to build message: {}", e)))?;

        transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        tracing::info!(to = %recap.to, period = %recap.period_label, "Recap mail sent");
        Ok(())
    }
}

/// Log-only mailer used when SMTP is not configured.
pub struct MockRecapMailer {
    sent: AtomicU64,
}

impl MockRecapMailer {
    pub fn new() -> Self {
        Self {
            sent: AtomicU64::new(0),
        }
    }

    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl Default for MockRecapMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecapSender for MockRecapMailer {
    async fn send_recap(&self, recap: &MonthlyRecap) -> Result<(), MailError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            to = %recap.to,
            period = %recap.period_label,
            total = %recap.total,
            "Mock recap mail (SMTP disabled)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecapLine;
    use rust_decimal::Decimal;

    fn recap() -> MonthlyRecap {
        MonthlyRecap {
            to: "user@example.fr".to_string(),
            period_label: "juillet 2025".to_string(),
            total: Decimal::new(154050, 2),
            lines: vec![
                RecapLine {
                    source: "stripe".to_string(),
                    total: Decimal::new(120050, 2),
                    transaction_count: 14,
                },
                RecapLine {
                    source: "shopify".to_string(),
                    total: Decimal::new(34000, 2),
                    transaction_count: 5,
                },
            ],
        }
    }

    #[test]
    fn text_body_lists_period_total_and_sources() {
        let body = render_text(&recap());
        assert!(body.contains("juillet 2025"));
        assert!(body.contains("1540.50 €"));
        assert!(body.contains("stripe : 1200.50 € (14 transaction(s))"));
        assert!(body.contains("shopify : 340.00 € (5 transaction(s))"));
    }

    #[test]
    fn html_body_contains_breakdown_rows() {
        let html = render_html(&recap());
        assert!(html.contains("<strong>juillet 2025</strong>"));
        assert!(html.contains("<td>stripe</td>"));
        assert!(html.contains("<td>340.00 €</td>"));
    }

    #[tokio::test]
    async fn disabled_smtp_mailer_reports_not_enabled() {
        let mailer = SmtpRecapMailer::new(SmtpConfig::disabled()).unwrap();
        assert!(matches!(
            mailer.send_recap(&recap()).await,
            Err(MailError::NotEnabled)
        ));
    }

    #[tokio::test]
    async fn mock_mailer_counts_sends() {
        let mailer = MockRecapMailer::new();
        mailer.send_recap(&recap()).await.unwrap();
        mailer.send_recap(&recap()).await.unwrap();
        assert_eq!(mailer.sent_count(), 2);
    }
}
