// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use notification_cell::models::CancelledBy;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::policy::{has_role, is_self_or_admin};

use crate::models::{
    Appointment, AppointmentError, BookAppointmentRequest, CancelAppointmentRequest, SlotQuery,
    UpdateAppointmentRequest,
};
use crate::services::booking::BookingService;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::SlotConflict => AppError::Conflict(
            "The selected time slot is no longer available. Please choose another time."
                .to_string(),
        ),
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::PatientNotFound => AppError::NotFound("Patient not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::DoctorNotApproved => {
            AppError::BadRequest("Selected doctor is not available".to_string())
        }
        AppointmentError::InvalidTime(msg) => AppError::BadRequest(msg),
        e @ (AppointmentError::InvalidStatusTransition { .. }
        | AppointmentError::AlreadyCancelled
        | AppointmentError::CannotCancelCompleted) => AppError::BadRequest(e.to_string()),
        AppointmentError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        AppointmentError::PersistenceFailure(msg) => AppError::Database(msg),
    }
}

fn is_participant(user: &User, appointment: &Appointment) -> bool {
    appointment.patient_id.to_string() == user.id
        || appointment.doctor_id.to_string() == user.id
        || has_role(user, "admin")
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    // Patients book for themselves; admins can book on their behalf.
    if !is_self_or_admin(&user, &request.patient_id.to_string()) {
        return Err(AppError::Auth(
            "Not authorized to book appointment for this patient".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointment = service
        .book_appointment(request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

/// Advisory slot probe for UI hints. The booking path re-checks and the
/// storage index has the final say.
#[axum::debug_handler]
pub async fn check_slot_availability(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let available = service
        .availability()
        .is_slot_available(
            query.doctor_id,
            query.appointment_date,
            query.appointment_time,
            auth.token(),
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "appointment_date": query.appointment_date,
        "appointment_time": query.appointment_time,
        "available": available
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    if !is_participant(&user, &appointment) {
        return Err(AppError::Auth(
            "Not authorized to access this appointment".to_string(),
        ));
    }

    Ok(Json(json!({ "appointment": appointment })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    // Patients cancel their own appointments, doctors theirs; admins act
    // as the system.
    let cancelled_by = if appointment.patient_id.to_string() == user.id {
        CancelledBy::Patient
    } else if appointment.doctor_id.to_string() == user.id {
        CancelledBy::Doctor
    } else if has_role(&user, "admin") {
        CancelledBy::System
    } else {
        return Err(AppError::Auth(
            "Not authorized to cancel this appointment".to_string(),
        ));
    };

    let actor_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user id".to_string()))?;

    let cancelled = service
        .cancel_appointment(
            appointment_id,
            actor_id,
            cancelled_by,
            request.reason,
            auth.token(),
        )
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": cancelled,
        "message": "Appointment cancelled successfully"
    })))
}

/// Status/notes update by the treating doctor (or an admin).
#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = BookingService::new(&state);
    let appointment = service
        .get_appointment(appointment_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    let is_treating_doctor =
        has_role(&user, "doctor") && appointment.doctor_id.to_string() == user.id;
    if !is_treating_doctor && !has_role(&user, "admin") {
        return Err(AppError::Auth(
            "Not authorized to update this appointment".to_string(),
        ));
    }

    let actor_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::BadRequest("Invalid user id".to_string()))?;

    let updated = service
        .update_appointment(appointment_id, actor_id, request, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": updated
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !is_self_or_admin(&user, &patient_id.to_string()) {
        return Err(AppError::Auth(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointments = service
        .list_for_patient(patient_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "count": appointments.len(),
        "appointments": appointments
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    if !is_self_or_admin(&user, &doctor_id.to_string()) {
        return Err(AppError::Auth(
            "Not authorized to view these appointments".to_string(),
        ));
    }

    let service = BookingService::new(&state);
    let appointments = service
        .list_for_doctor(doctor_id, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "count": appointments.len(),
        "appointments": appointments
    })))
}
