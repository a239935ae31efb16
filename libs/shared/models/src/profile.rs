use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row in the `profiles` table, the user directory this core reads from.
/// Credential management lives entirely outside the backend; this is the
/// only user data booking and delivery need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub specialty: Option<String>,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn is_doctor(&self) -> bool {
        self.role == "doctor"
    }

    pub fn is_patient(&self) -> bool {
        self.role == "patient"
    }
}
