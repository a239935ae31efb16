// libs/appointment-cell/src/services/availability.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::AppointmentError;

/// Exact-slot availability probe.
///
/// A slot is free when no row exists for the (doctor, date, time) triple
/// with a non-cancelled status. This read is advisory: two callers can
/// both see "free" and race to the insert. The partial unique index on
/// the appointments table is what decides the winner.
pub struct SlotAvailabilityService {
    supabase: Arc<SupabaseClient>,
}

impl SlotAvailabilityService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn is_slot_available(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        debug!(
            "Checking slot availability for doctor {} on {} at {}",
            doctor_id, date, time
        );

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&appointment_time=eq.{}&status=neq.cancelled&limit=1",
            doctor_id, date, time
        );

        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::PersistenceFailure(e.to_string()))?;

        Ok(rows.is_empty())
    }
}
