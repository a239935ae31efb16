// libs/notification-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE NOTIFICATION MODELS
// ==============================================================================

/// A durable notification row. Rows are append-only from the queue's point
/// of view: only the dispatcher mutates them, and they are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub subject: String,
    pub message: String,
    pub delivery_method: DeliveryMethod,
    pub status: NotificationStatus,
    pub appointment_id: Option<Uuid>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Booking,
    Reminder,
    Cancellation,
    General,
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationType::Booking => write!(f, "booking"),
            NotificationType::Reminder => write!(f, "reminder"),
            NotificationType::Cancellation => write!(f, "cancellation"),
            NotificationType::General => write!(f, "general"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Email,
    Sms,
    Both,
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryMethod::Email => write!(f, "email"),
            DeliveryMethod::Sms => write!(f, "sms"),
            DeliveryMethod::Both => write!(f, "both"),
        }
    }
}

/// Pending is the only non-terminal state. Sent and Failed are final:
/// a processed notification is never re-enqueued automatically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "pending"),
            NotificationStatus::Sent => write!(f, "sent"),
            NotificationStatus::Failed => write!(f, "failed"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// The enqueue primitive's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub subject: String,
    pub message: String,
    pub delivery_method: DeliveryMethod,
    pub appointment_id: Option<Uuid>,
}

/// The slice of an appointment that notification composition needs.
/// Kept id-based on purpose: recipients are resolved against the user
/// directory at composition and again at dispatch time.
#[derive(Debug, Clone)]
pub struct AppointmentDetails {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub appointment_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CancelledBy {
    Patient,
    Doctor,
    System,
}

impl fmt::Display for CancelledBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelledBy::Patient => write!(f, "Patient"),
            CancelledBy::Doctor => write!(f, "Doctor"),
            CancelledBy::System => write!(f, "System"),
        }
    }
}

// ==============================================================================
// DISPATCH MODELS
// ==============================================================================

/// Per-tick dispatch outcome, logged by the scheduler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub processed: usize,
    pub sent: usize,
    pub failed: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("Recipient not found")]
    RecipientNotFound,

    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),
}
