// libs/notification-cell/src/services/dispatch.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::profile::UserProfile;

use crate::models::{DeliveryMethod, DispatchSummary, Notification, NotificationError};
use crate::services::mailer::{HttpMailer, Mailer};

/// Upper bound on a single delivery attempt. A hung mail provider must
/// resolve to a Failed row, not a stalled batch.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Drains the Pending queue in bounded, oldest-first batches. Every
/// selected notification leaves the batch as Sent or Failed; one bad
/// recipient or provider error never aborts the rest of the batch.
pub struct NotificationDispatchService {
    supabase: Arc<SupabaseClient>,
    mailer: Arc<dyn Mailer>,
    batch_size: usize,
}

impl NotificationDispatchService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_parts(
            Arc::new(SupabaseClient::new(config)),
            Arc::new(HttpMailer::new(config)),
            config.dispatch_batch_size,
        )
    }

    pub fn with_parts(
        supabase: Arc<SupabaseClient>,
        mailer: Arc<dyn Mailer>,
        batch_size: usize,
    ) -> Self {
        Self {
            supabase,
            mailer,
            batch_size,
        }
    }

    pub async fn dispatch(&self, auth_token: &str) -> Result<DispatchSummary, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?status=eq.pending&order=created_at.asc&limit={}",
            self.batch_size
        );

        let pending: Vec<Notification> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))?;

        if pending.is_empty() {
            return Ok(DispatchSummary::default());
        }

        debug!("Dispatching {} pending notifications", pending.len());

        let mut summary = DispatchSummary {
            processed: pending.len(),
            ..Default::default()
        };

        for notification in pending {
            match self.deliver(&notification, auth_token).await {
                Ok(()) => {
                    self.mark_sent(notification.id, auth_token).await;
                    summary.sent += 1;
                    info!("Notification sent: {}", notification.id);
                }
                Err(reason) => {
                    self.mark_failed(notification.id, &reason, auth_token).await;
                    summary.failed += 1;
                    error!("Notification {} failed: {}", notification.id, reason);
                }
            }
        }

        Ok(summary)
    }

    /// One bounded delivery attempt. Returns the failure reason recorded
    /// on the row.
    async fn deliver(&self, notification: &Notification, auth_token: &str) -> Result<(), String> {
        let recipient = self
            .fetch_recipient(notification.user_id, auth_token)
            .await?
            .ok_or_else(|| "User not found".to_string())?;

        match notification.delivery_method {
            DeliveryMethod::Email | DeliveryMethod::Both => {
                let attempt = self.mailer.send(
                    &recipient.email,
                    &notification.subject,
                    &notification.message,
                );

                match timeout(DELIVERY_TIMEOUT, attempt).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(_) => Err(format!(
                        "delivery timed out after {} seconds",
                        DELIVERY_TIMEOUT.as_secs()
                    )),
                }
            }
            // The SMS channel has no provider wired up; record the row as
            // failed rather than leave it pending forever.
            DeliveryMethod::Sms => Err("SMS delivery not configured".to_string()),
        }
    }

    async fn fetch_recipient(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<UserProfile>, String> {
        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);

        let mut rows: Vec<UserProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| format!("recipient lookup failed: {}", e))?;

        Ok(rows.pop())
    }

    async fn mark_sent(&self, id: Uuid, auth_token: &str) {
        let body = json!({
            "status": "sent",
            "sent_at": Utc::now().to_rfc3339(),
        });

        if let Err(e) = self.update_row(id, body, auth_token).await {
            error!("Failed to mark notification {} as sent: {}", id, e);
        }
    }

    async fn mark_failed(&self, id: Uuid, reason: &str, auth_token: &str) {
        let body = json!({
            "status": "failed",
            "error_message": reason,
            "sent_at": Utc::now().to_rfc3339(),
        });

        if let Err(e) = self.update_row(id, body, auth_token).await {
            error!("Failed to mark notification {} as failed: {}", id, e);
        }
    }

    async fn update_row(
        &self,
        id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}", id);

        self.supabase
            .request::<Value>(Method::PATCH, &path, Some(auth_token), Some(body))
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))?;

        Ok(())
    }
}
