use async_trait::async_trait;
use painscout_core::{BillingError, CoreError, EmailConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
}

/// Transactional email delivery. Callers treat failures as non-fatal.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), CoreError>;
}

/// Posts `{from, to, subject, text}` to an HTTP email API with a bearer key.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            from,
        })
    }
}

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &Email) -> Result<(), CoreError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&OutgoingEmail {
                from: &self.from,
                to: &email.to,
                subject: &email.subject,
                text: &email.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BillingError::EmailFailed {
                reason: format!("HTTP {}: {}", status.as_u16(), body),
            }
            .into());
        }
        debug!("Email '{}' accepted for {}", email.subject, email.to);
        Ok(())
    }
}

/// Used when no email API is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), CoreError> {
        info!("Email (not sent) to {}: {}", email.to, email.subject);
        Ok(())
    }
}

/// HTTP delivery when both the API url and key are configured.
pub fn mailer_from_config(config: &EmailConfig) -> Result<Arc<dyn Mailer>, CoreError> {
    match (&config.api_url, &config.api_key) {
        (Some(url), Some(key)) => Ok(Arc::new(HttpMailer::new(
            url.clone(),
            key.clone(),
            config.from.clone(),
        )?)),
        _ => Ok(Arc::new(LogMailer)),
    }
}
