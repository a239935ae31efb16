// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Status transition rules. Transitions only move forward:
/// Scheduled -> Ongoing -> Completed, with Cancelled reachable from any
/// non-terminal state. Completed and Cancelled are terminal.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        next: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, next);

        if !self.valid_transitions(current).contains(next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.clone(),
                to: next.clone(),
            });
        }

        Ok(())
    }

    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Ongoing,
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Ongoing => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Cancellation guard: cancelling twice is an error, as is cancelling
    /// an appointment that already took place.
    pub fn ensure_cancellable(&self, status: &AppointmentStatus) -> Result<(), AppointmentError> {
        match status {
            AppointmentStatus::Cancelled => Err(AppointmentError::AlreadyCancelled),
            AppointmentStatus::Completed => Err(AppointmentError::CannotCancelCompleted),
            AppointmentStatus::Scheduled | AppointmentStatus::Ongoing => Ok(()),
        }
    }

    pub fn is_terminal(&self, status: &AppointmentStatus) -> bool {
        matches!(
            status,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn forward_transitions_are_allowed() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Ongoing)
            .is_ok());
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Scheduled, &AppointmentStatus::Completed)
            .is_ok());
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Ongoing, &AppointmentStatus::Completed)
            .is_ok());
        assert!(lifecycle
            .validate_transition(&AppointmentStatus::Ongoing, &AppointmentStatus::Cancelled)
            .is_ok());
    }

    #[test]
    fn backward_transitions_are_rejected() {
        let lifecycle = AppointmentLifecycleService::new();

        assert_matches!(
            lifecycle.validate_transition(&AppointmentStatus::Ongoing, &AppointmentStatus::Scheduled),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
        assert_matches!(
            lifecycle
                .validate_transition(&AppointmentStatus::Completed, &AppointmentStatus::Ongoing),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
        assert_matches!(
            lifecycle
                .validate_transition(&AppointmentStatus::Cancelled, &AppointmentStatus::Scheduled),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }

    #[test]
    fn cancellation_guards() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.ensure_cancellable(&AppointmentStatus::Scheduled).is_ok());
        assert!(lifecycle.ensure_cancellable(&AppointmentStatus::Ongoing).is_ok());
        assert_matches!(
            lifecycle.ensure_cancellable(&AppointmentStatus::Cancelled),
            Err(AppointmentError::AlreadyCancelled)
        );
        assert_matches!(
            lifecycle.ensure_cancellable(&AppointmentStatus::Completed),
            Err(AppointmentError::CannotCancelCompleted)
        );
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle.valid_transitions(&AppointmentStatus::Completed).is_empty());
        assert!(lifecycle.valid_transitions(&AppointmentStatus::Cancelled).is_empty());
        assert!(lifecycle.is_terminal(&AppointmentStatus::Completed));
        assert!(lifecycle.is_terminal(&AppointmentStatus::Cancelled));
        assert!(!lifecycle.is_terminal(&AppointmentStatus::Scheduled));
    }
}
