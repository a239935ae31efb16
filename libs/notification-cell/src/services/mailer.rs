// libs/notification-cell/src/services/mailer.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};

use shared_config::AppConfig;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("mailer is not configured")]
    NotConfigured,

    #[error("mailer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mailer api error ({status}): {message}")]
    Api { status: u16, message: String },
}

/// Outbound mail capability. The dispatcher is the only consumer; the
/// trait seam exists so delivery can be faked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError>;
}

/// HTTP transactional-mail client.
/// POST {base_url}/v1/messages with a bearer token.
pub struct HttpMailer {
    client: Client,
    base_url: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.mailer_base_url.clone(),
            api_token: config.mailer_api_token.clone(),
            from: config.mailer_from.clone(),
        }
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.api_token.is_empty()
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailerError> {
        if !self.is_configured() {
            // Development environments run without a mail provider; the
            // notification row records the failure either way.
            warn!("Email not sent - mailer not configured. To: {}, Subject: {}", to, subject);
            debug!("Email body would be: {}", body);
            return Err(MailerError::NotConfigured);
        }

        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MailerError::Api {
                status: status.as_u16(),
                message,
            });
        }

        info!("Email sent to {} ({})", to, subject);
        Ok(())
    }
}
