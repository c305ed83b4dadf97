//! Purchase receipt email.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and text templates.

use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use econ_core::{Email, OrderId};

use crate::config::EmailConfig;

const RECEIPT_SUBJECT: &str = "Order Confirmation";

/// Everything the receipt shows the buyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub to: Email,
    pub order_id: OrderId,
    pub product_name: String,
    pub product_description: String,
    pub price_paid: String,
    pub purchased_at: DateTime<Utc>,
    pub download_url: String,
    pub download_expires_at: DateTime<Utc>,
}

/// HTML template for the receipt email.
#[derive(Template)]
#[template(path = "email/receipt.html")]
struct ReceiptEmailHtml<'a> {
    receipt: &'a Receipt,
}

/// Plain text template for the receipt email.
#[derive(Template)]
#[template(path = "email/receipt.txt")]
struct ReceiptEmailText<'a> {
    receipt: &'a Receipt,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Delivers purchase receipts.
#[async_trait]
pub trait ReceiptMailer: Send + Sync {
    /// Send `receipt` to its buyer.
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), EmailError>;
}

/// Render the receipt as `(text, html)` bodies.
///
/// # Errors
///
/// Returns [`EmailError::Template`] if a template fails to render.
pub fn render_receipt(receipt: &Receipt) -> Result<(String, String), EmailError> {
    let text = ReceiptEmailText { receipt }.render()?;
    let html = ReceiptEmailHtml { receipt }.render()?;
    Ok((text, html))
}

/// Receipt mailer over SMTP with STARTTLS.
#[derive(Clone)]
pub struct SmtpReceiptMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpReceiptMailer {
    /// Create a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: String,
        html_body: String,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

#[async_trait]
impl ReceiptMailer for SmtpReceiptMailer {
    async fn send_receipt(&self, receipt: &Receipt) -> Result<(), EmailError> {
        let (text, html) = render_receipt(receipt)?;
        self.send_multipart_email(receipt.to.as_str(), RECEIPT_SUBJECT, text, html)
            .await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    use async_trait::async_trait;

    use super::{EmailError, Receipt, ReceiptMailer, render_receipt};

    /// Mailer that renders and records receipts instead of sending them.
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Receipt>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every send fail as an unreachable relay would.
        pub fn fail_sends(&self, fail: bool) {
            self.failing.store(fail, Ordering::SeqCst);
        }

        /// Receipts sent so far.
        #[must_use]
        pub fn sent(&self) -> Vec<Receipt> {
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl ReceiptMailer for RecordingMailer {
        async fn send_receipt(&self, receipt: &Receipt) -> Result<(), EmailError> {
            render_receipt(receipt)?;
            if self.failing.load(Ordering::SeqCst) {
                return Err(EmailError::InvalidAddress(receipt.to.to_string()));
            }
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(receipt.clone());
            Ok(())
        }
    }
}
