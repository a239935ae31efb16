// libs/notification-cell/src/services/notify.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::profile::UserProfile;

use crate::models::{
    AppointmentDetails, CancelledBy, DeliveryMethod, EnqueueNotification, Notification,
    NotificationError, NotificationType,
};

/// Durable notification queue. `enqueue` appends a Pending row; the
/// composition helpers build the user-facing messages for the flows that
/// produce notifications (booking, cancellation, reminders).
pub struct NotificationService {
    supabase: Arc<SupabaseClient>,
}

impl NotificationService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_client(Arc::new(SupabaseClient::new(config)))
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Append a Pending notification. Fails only when the persistence
    /// gateway does.
    pub async fn enqueue(
        &self,
        request: EnqueueNotification,
        auth_token: &str,
    ) -> Result<Notification, NotificationError> {
        let body = json!({
            "user_id": request.user_id,
            "notification_type": request.notification_type,
            "subject": request.subject,
            "message": request.message,
            "delivery_method": request.delivery_method,
            "status": "pending",
            "appointment_id": request.appointment_id,
            "created_at": Utc::now().to_rfc3339(),
        });

        let mut rows: Vec<Notification> = self
            .supabase
            .insert_returning("/rest/v1/notifications", Some(auth_token), body)
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))?;

        let notification = rows.pop().ok_or_else(|| {
            NotificationError::PersistenceFailure("insert returned no row".to_string())
        })?;

        info!(
            "Notification queued: {} for user {}",
            notification.notification_type, notification.user_id
        );
        Ok(notification)
    }

    /// Booking confirmation addressed to the patient.
    pub async fn queue_booking_confirmation(
        &self,
        details: &AppointmentDetails,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let (Some(patient), Some(doctor)) = (
            self.fetch_profile(details.patient_id, auth_token).await?,
            self.fetch_profile(details.doctor_id, auth_token).await?,
        ) else {
            warn!("Cannot queue booking confirmation: patient or doctor not found");
            return Ok(());
        };

        let appointment_type = details
            .appointment_type
            .as_deref()
            .unwrap_or("General Consultation");

        let message = format!(
            "Dear {},\n\n\
             Your appointment has been successfully booked.\n\n\
             Appointment Details:\n\
             - Doctor: {} ({})\n\
             - Date: {}\n\
             - Time: {}\n\
             - Type: {}\n\n\
             Please be ready 10 minutes before your scheduled time.\n\n\
             Thank you,\n\
             Mindwell Clinic",
            patient.full_name,
            doctor.full_name,
            doctor.specialty.as_deref().unwrap_or("General Practice"),
            details.appointment_date.format("%B %d, %Y"),
            details.appointment_time.format("%I:%M %p"),
            appointment_type,
        );

        self.enqueue(
            EnqueueNotification {
                user_id: details.patient_id,
                notification_type: NotificationType::Booking,
                subject: "Appointment Booking Confirmation".to_string(),
                message,
                delivery_method: DeliveryMethod::Email,
                appointment_id: Some(details.appointment_id),
            },
            auth_token,
        )
        .await?;

        Ok(())
    }

    /// Reminder addressed to the patient, composed for a given lead time.
    pub async fn queue_appointment_reminder(
        &self,
        details: &AppointmentDetails,
        hours_before: i64,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let (Some(patient), Some(doctor)) = (
            self.fetch_profile(details.patient_id, auth_token).await?,
            self.fetch_profile(details.doctor_id, auth_token).await?,
        ) else {
            warn!("Cannot queue reminder: patient or doctor not found");
            return Ok(());
        };

        let message = format!(
            "Dear {},\n\n\
             This is a reminder that you have an appointment in {} hour(s).\n\n\
             Appointment Details:\n\
             - Doctor: {}\n\
             - Date: {}\n\
             - Time: {}\n\n\
             Please be on time.\n\n\
             Thank you,\n\
             Mindwell Clinic",
            patient.full_name,
            hours_before,
            doctor.full_name,
            details.appointment_date.format("%B %d, %Y"),
            details.appointment_time.format("%I:%M %p"),
        );

        self.enqueue(
            EnqueueNotification {
                user_id: details.patient_id,
                notification_type: NotificationType::Reminder,
                subject: format!("Appointment Reminder - {} hour(s) before", hours_before),
                message,
                delivery_method: DeliveryMethod::Email,
                appointment_id: Some(details.appointment_id),
            },
            auth_token,
        )
        .await?;

        Ok(())
    }

    /// Cancellation notice addressed to the counterpart of whoever
    /// cancelled.
    pub async fn queue_cancellation_notice(
        &self,
        details: &AppointmentDetails,
        cancelled_by: CancelledBy,
        auth_token: &str,
    ) -> Result<(), NotificationError> {
        let (Some(patient), Some(doctor)) = (
            self.fetch_profile(details.patient_id, auth_token).await?,
            self.fetch_profile(details.doctor_id, auth_token).await?,
        ) else {
            warn!("Cannot queue cancellation notice: patient or doctor not found");
            return Ok(());
        };

        let (recipient_id, recipient_name) = match cancelled_by {
            CancelledBy::Patient => (details.doctor_id, doctor.full_name.as_str()),
            CancelledBy::Doctor | CancelledBy::System => {
                (details.patient_id, patient.full_name.as_str())
            }
        };

        let message = format!(
            "Dear {},\n\n\
             Your appointment has been cancelled by {}.\n\n\
             Appointment Details:\n\
             - Doctor: {}\n\
             - Patient: {}\n\
             - Date: {}\n\
             - Time: {}\n\n\
             If you need to reschedule, please contact us.\n\n\
             Thank you,\n\
             Mindwell Clinic",
            recipient_name,
            cancelled_by,
            doctor.full_name,
            patient.full_name,
            details.appointment_date.format("%B %d, %Y"),
            details.appointment_time.format("%I:%M %p"),
        );

        self.enqueue(
            EnqueueNotification {
                user_id: recipient_id,
                notification_type: NotificationType::Cancellation,
                subject: "Appointment Cancelled".to_string(),
                message,
                delivery_method: DeliveryMethod::Email,
                appointment_id: Some(details.appointment_id),
            },
            auth_token,
        )
        .await?;

        Ok(())
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Notification>, NotificationError> {
        let path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit=50",
            user_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))
    }

    /// Failed rows for operator follow-up; there is no automatic retry.
    pub async fn list_failed(
        &self,
        auth_token: &str,
    ) -> Result<Vec<Notification>, NotificationError> {
        let path = "/rest/v1/notifications?status=eq.failed&order=created_at.desc&limit=100";

        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))
    }

    async fn fetch_profile(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<UserProfile>, NotificationError> {
        let path = format!("/rest/v1/profiles?id=eq.{}", user_id);

        let mut rows: Vec<UserProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::PersistenceFailure(e.to_string()))?;

        if rows.is_empty() {
            debug!("Profile {} not found", user_id);
        }

        Ok(rows.pop())
    }
}
