// libs/appointment-cell/src/services/reminders.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use notification_cell::services::notify::NotificationService;
use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Appointment, AppointmentError};

/// Half-width of the matching window around "now + lead". The scan
/// cadence must stay below the full window width or appointments slip
/// through between ticks.
const WINDOW_MINUTES: i64 = 5;

/// (lead, dedup lookback) pairs. The lookback is what keeps a lead from
/// firing twice while consecutive ticks still see the appointment inside
/// the window.
const REMINDER_LEADS: [(i64, i64); 2] = [(24, 60), (1, 10)];

/// Finds Scheduled appointments crossing the 24h/1h lead thresholds and
/// queues one reminder per lead. Best effort: the window match plus
/// lookback dedup approximates at-most-once, it does not guarantee it.
pub struct ReminderScanService {
    supabase: Arc<SupabaseClient>,
    notifications: Arc<NotificationService>,
}

impl ReminderScanService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self {
            notifications: Arc::new(NotificationService::with_client(Arc::clone(&supabase))),
            supabase,
        }
    }

    pub fn with_parts(
        supabase: Arc<SupabaseClient>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            supabase,
            notifications,
        }
    }

    /// One scan pass over both lead times. Returns how many reminders
    /// were queued.
    pub async fn scan(&self, auth_token: &str) -> Result<usize, AppointmentError> {
        let now = Utc::now();
        let mut queued = 0;

        for (lead_hours, lookback_minutes) in REMINDER_LEADS {
            queued += self
                .scan_lead(now, lead_hours, lookback_minutes, auth_token)
                .await?;
        }

        if queued > 0 {
            info!("Reminder scan queued {} notifications", queued);
        }
        Ok(queued)
    }

    async fn scan_lead(
        &self,
        now: DateTime<Utc>,
        lead_hours: i64,
        lookback_minutes: i64,
        auth_token: &str,
    ) -> Result<usize, AppointmentError> {
        let target = now + Duration::hours(lead_hours);
        let target_date = target.date_naive();

        // Window clamped to the target day; an appointment minutes past
        // midnight is picked up by the next tick instead.
        let window_start = target - Duration::minutes(WINDOW_MINUTES);
        let window_end = target + Duration::minutes(WINDOW_MINUTES);
        let start_time = if window_start.date_naive() == target_date {
            window_start.time()
        } else {
            NaiveTime::MIN
        };
        let end_time = if window_end.date_naive() == target_date {
            window_end.time()
        } else {
            NaiveTime::from_hms_opt(23, 59, 59).unwrap()
        };

        debug!(
            "Scanning for {}h reminders on {} between {} and {}",
            lead_hours, target_date, start_time, end_time
        );

        let path = format!(
            "/rest/v1/appointments?status=eq.scheduled&appointment_date=eq.{}&appointment_time=gte.{}&appointment_time=lte.{}&order=appointment_time.asc",
            target_date, start_time, end_time
        );

        let due: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        let mut queued = 0;
        for appointment in due {
            match self
                .has_recent_reminder(appointment.id, now, lookback_minutes, auth_token)
                .await
            {
                Ok(true) => {
                    debug!(
                        "Skipping {}h reminder for appointment {} (already queued)",
                        lead_hours, appointment.id
                    );
                }
                Ok(false) => {
                    if let Err(e) = self
                        .notifications
                        .queue_appointment_reminder(
                            &appointment.to_details(),
                            lead_hours,
                            auth_token,
                        )
                        .await
                    {
                        error!(
                            "Failed to queue {}h reminder for appointment {}: {}",
                            lead_hours, appointment.id, e
                        );
                    } else {
                        queued += 1;
                    }
                }
                Err(e) => {
                    // One broken dedup lookup must not starve the rest of
                    // the batch.
                    error!(
                        "Reminder dedup check failed for appointment {}: {}",
                        appointment.id, e
                    );
                }
            }
        }

        Ok(queued)
    }

    /// Dedup marker: a Reminder notification for this appointment created
    /// inside the lookback window.
    async fn has_recent_reminder(
        &self,
        appointment_id: Uuid,
        now: DateTime<Utc>,
        lookback_minutes: i64,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let cutoff = (now - Duration::minutes(lookback_minutes)).to_rfc3339();
        let cutoff_encoded = urlencoding::encode(&cutoff);

        let path = format!(
            "/rest/v1/notifications?appointment_id=eq.{}&notification_type=eq.reminder&created_at=gte.{}&limit=1",
            appointment_id, cutoff_encoded
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
