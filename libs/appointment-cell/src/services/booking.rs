// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use audit_cell::services::audit::AuditService;
use notification_cell::models::CancelledBy;
use notification_cell::services::notify::NotificationService;
use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::profile::UserProfile;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::availability::SlotAvailabilityService;
use crate::services::lifecycle::AppointmentLifecycleService;

/// Booking orchestration.
///
/// The write path is check-then-insert: the availability read gives the
/// caller an early, friendly conflict, and the partial unique index on
/// (doctor_id, appointment_date, appointment_time) WHERE status <>
/// 'cancelled' is the guard that actually holds under concurrency. A 409
/// from the gateway therefore maps to `SlotConflict`, never to a generic
/// persistence error.
pub struct BookingService {
    supabase: Arc<SupabaseClient>,
    availability: SlotAvailabilityService,
    lifecycle: AppointmentLifecycleService,
    notifications: Arc<NotificationService>,
    audit: AuditService,
}

impl BookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            availability: SlotAvailabilityService::new(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            notifications: Arc::new(NotificationService::with_client(Arc::clone(&supabase))),
            audit: AuditService::with_client(Arc::clone(&supabase)),
            supabase,
        }
    }

    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        self.validate_booking_request(&request)?;
        self.verify_patient_exists(request.patient_id, auth_token).await?;
        self.verify_doctor_bookable(request.doctor_id, auth_token).await?;

        // Advisory check for the common case; the index still decides
        // when two requests race past it.
        let available = self
            .availability
            .is_slot_available(
                request.doctor_id,
                request.appointment_date,
                request.appointment_time,
                auth_token,
            )
            .await?;

        if !available {
            warn!(
                "Slot taken for doctor {} on {} at {}",
                request.doctor_id, request.appointment_date, request.appointment_time
            );
            return Err(AppointmentError::SlotConflict);
        }

        let appointment = self.insert_appointment(&request, auth_token).await?;

        self.write_audit(
            request.patient_id,
            appointment.id,
            "book",
            &format!(
                "Booked appointment with doctor {} on {} at {}",
                request.doctor_id, request.appointment_date, request.appointment_time
            ),
            auth_token,
        )
        .await;

        // Confirmation is queued after the slot is secured and never
        // feeds back into the booking outcome.
        let notifications = Arc::clone(&self.notifications);
        let details = appointment.to_details();
        let token = auth_token.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifications.queue_booking_confirmation(&details, &token).await {
                error!(
                    "Error queueing booking confirmation for appointment {}: {}",
                    details.appointment_id, e
                );
            }
        });

        info!(
            "Appointment booked: {} for patient {} with doctor {}",
            appointment.id, appointment.patient_id, appointment.doctor_id
        );
        Ok(appointment)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
        cancelled_by: CancelledBy,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.ensure_cancellable(&current.status)?;

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(AppointmentStatus::Cancelled));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(reason) = &reason {
            update.insert(
                "notes".to_string(),
                json!(format!("Cancelled by {}: {}", cancelled_by, reason)),
            );
        }

        let cancelled = self
            .patch_appointment(appointment_id, Value::Object(update), auth_token)
            .await?;

        self.write_audit(
            actor_id,
            appointment_id,
            "cancel",
            &format!("Appointment cancelled by {}", cancelled_by),
            auth_token,
        )
        .await;

        let notifications = Arc::clone(&self.notifications);
        let details = cancelled.to_details();
        let token = auth_token.to_string();
        tokio::spawn(async move {
            if let Err(e) = notifications
                .queue_cancellation_notice(&details, cancelled_by, &token)
                .await
            {
                error!(
                    "Error queueing cancellation notice for appointment {}: {}",
                    details.appointment_id, e
                );
            }
        });

        info!("Appointment {} cancelled by {}", appointment_id, cancelled_by);
        Ok(cancelled)
    }

    /// Doctor-side status/notes update with lifecycle validation.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        actor_id: Uuid,
        request: UpdateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        let current = self.get_appointment(appointment_id, auth_token).await?;

        let mut update = serde_json::Map::new();

        if let Some(new_status) = &request.status {
            if *new_status == AppointmentStatus::Cancelled {
                self.lifecycle.ensure_cancellable(&current.status)?;
            } else {
                self.lifecycle.validate_transition(&current.status, new_status)?;
            }
            update.insert("status".to_string(), json!(new_status));
        }
        if let Some(notes) = &request.notes {
            update.insert("notes".to_string(), json!(notes));
        }

        if update.is_empty() {
            return Ok(current);
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .patch_appointment(appointment_id, Value::Object(update), auth_token)
            .await?;

        self.write_audit(
            actor_id,
            appointment_id,
            "update",
            &format!("Appointment updated to status {}", updated.status),
            auth_token,
        )
        .await;

        // A doctor-side cancellation notifies the patient, same as the
        // dedicated cancel flow.
        if request.status == Some(AppointmentStatus::Cancelled) {
            let notifications = Arc::clone(&self.notifications);
            let details = updated.to_details();
            let token = auth_token.to_string();
            tokio::spawn(async move {
                if let Err(e) = notifications
                    .queue_cancellation_notice(&details, CancelledBy::Doctor, &token)
                    .await
                {
                    error!(
                        "Error queueing cancellation notice for appointment {}: {}",
                        details.appointment_id, e
                    );
                }
            });
        }

        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let mut rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        rows.pop().ok_or(AppointmentError::NotFound)
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.desc,appointment_time.desc",
            patient_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=appointment_date.desc,appointment_time.desc",
            doctor_id
        );

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))
    }

    pub fn availability(&self) -> &SlotAvailabilityService {
        &self.availability
    }

    // ==============================================================================
    // PRIVATE HELPERS
    // ==============================================================================

    fn validate_booking_request(
        &self,
        request: &BookAppointmentRequest,
    ) -> Result<(), AppointmentError> {
        let scheduled = request
            .appointment_date
            .and_time(request.appointment_time)
            .and_utc();

        if scheduled <= Utc::now() {
            return Err(AppointmentError::InvalidTime(
                "Cannot book appointments in the past".to_string(),
            ));
        }

        Ok(())
    }

    async fn verify_patient_exists(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/profiles?id=eq.{}&role=eq.patient", patient_id);

        let rows: Vec<UserProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        if rows.is_empty() {
            return Err(AppointmentError::PatientNotFound);
        }

        Ok(())
    }

    async fn verify_doctor_bookable(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/profiles?id=eq.{}&role=eq.doctor", doctor_id);

        let mut rows: Vec<UserProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        let doctor = rows.pop().ok_or(AppointmentError::DoctorNotFound)?;

        if !doctor.is_approved {
            return Err(AppointmentError::DoctorNotApproved);
        }

        Ok(())
    }

    async fn insert_appointment(
        &self,
        request: &BookAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let body = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "appointment_date": request.appointment_date,
            "appointment_time": request.appointment_time,
            "appointment_type": request
                .appointment_type
                .as_deref()
                .unwrap_or("General Consultation"),
            "status": AppointmentStatus::Scheduled,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let mut rows: Vec<Appointment> = self
            .supabase
            .insert_returning("/rest/v1/appointments", Some(auth_token), body)
            .await
            .map_err(|e| match e {
                // The partial unique index rejected a concurrent double
                // booking after the advisory check had passed.
                DbError::Conflict(_) => AppointmentError::SlotConflict,
                other => AppointmentError::PersistenceFailure(other.to_string()),
            })?;

        rows.pop().ok_or_else(|| {
            AppointmentError::PersistenceFailure("insert returned no row".to_string())
        })
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let mut rows: Vec<Appointment> = self
            .supabase
            .update_returning(&path, Some(auth_token), body)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        rows.pop().ok_or(AppointmentError::NotFound)
    }

    async fn write_audit(
        &self,
        actor_id: Uuid,
        appointment_id: Uuid,
        action: &str,
        description: &str,
        auth_token: &str,
    ) {
        if let Err(e) = self
            .audit
            .log_entity_access(
                actor_id,
                "appointment",
                Some(appointment_id),
                action,
                description,
                None,
                auth_token,
            )
            .await
        {
            warn!(
                "Failed to write audit entry for appointment {}: {}",
                appointment_id, e
            );
        }
    }
}
