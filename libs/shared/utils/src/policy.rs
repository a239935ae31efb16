use shared_models::auth::User;
use shared_models::error::AppError;

/// Explicit role policy check, used by handlers instead of implicit
/// claim plumbing.
pub fn has_role(user: &User, role: &str) -> bool {
    user.role.as_deref() == Some(role)
}

pub fn require_role(user: &User, role: &str) -> Result<(), AppError> {
    if has_role(user, role) {
        Ok(())
    } else {
        Err(AppError::Auth(format!("Requires {} role", role)))
    }
}

/// True when the authenticated user is the subject itself or an admin.
pub fn is_self_or_admin(user: &User, subject_id: &str) -> bool {
    user.id == subject_id || has_role(user, "admin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestUser;

    #[test]
    fn role_checks() {
        let doctor = TestUser::doctor("doc@example.com").to_user();
        assert!(has_role(&doctor, "doctor"));
        assert!(!has_role(&doctor, "admin"));
        assert!(require_role(&doctor, "doctor").is_ok());
        assert!(require_role(&doctor, "patient").is_err());
    }

    #[test]
    fn self_or_admin() {
        let patient = TestUser::patient("pat@example.com");
        let user = patient.to_user();
        assert!(is_self_or_admin(&user, &patient.id));
        assert!(!is_self_or_admin(&user, "someone-else"));

        let admin = TestUser::admin("admin@example.com").to_user();
        assert!(is_self_or_admin(&admin, "anyone"));
    }
}
