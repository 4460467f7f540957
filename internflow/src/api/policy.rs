//! Authorization predicates used by every handler.

use uuid::Uuid;

use crate::entity::{internship, role::RoleName};

use super::{ApiErr, jwt::CurrentUser};

/// The caller must hold `role`; otherwise 403 with `denied`.
pub fn require_role(caller: &CurrentUser, role: RoleName, denied: &str) -> Result<(), ApiErr> {
    if caller.has_role(role) {
        Ok(())
    } else {
        tracing::debug!(
            user = %caller.id(),
            required = %role,
            actual = caller.role_name().unwrap_or("none"),
            "role check failed"
        );
        Err(ApiErr::forbidden(denied))
    }
}

/// The caller must be `owner`; otherwise 403 with `denied`.
pub fn require_owner(caller: &CurrentUser, owner: Uuid, denied: &str) -> Result<(), ApiErr> {
    if caller.id() == owner {
        Ok(())
    } else {
        Err(ApiErr::forbidden(denied))
    }
}

/// Students see their own internships, teachers the ones assigned to them.
pub fn can_view_internship(caller: &CurrentUser, internship: &internship::Model) -> bool {
    internship.student_id == caller.id() || internship.teacher_id == Some(caller.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{role, user};
    use axum::http::StatusCode;
    use chrono::Utc;

    fn caller(role: Option<RoleName>) -> CurrentUser {
        let now = Utc::now().naive_utc();
        CurrentUser {
            user: user::Model {
                id: Uuid::now_v7(),
                username: "amina".into(),
                email: String::new(),
                password_hash: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                phone: None,
                profile_picture: None,
                role_id: None,
                is_active: true,
                is_staff: false,
                last_login_at: None,
                created_at: now,
                updated_at: now,
            },
            role: role.map(|r| role::Model {
                id: Uuid::now_v7(),
                name: r.as_str().to_string(),
            }),
        }
    }

    #[test]
    fn role_must_match_exactly() {
        let student = caller(Some(RoleName::Student));
        assert!(require_role(&student, RoleName::Student, "x").is_ok());
        let err = require_role(&student, RoleName::Administrator, "Only administrators").unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn missing_role_is_forbidden() {
        let nobody = caller(None);
        for r in RoleName::ALL {
            assert!(require_role(&nobody, r, "x").is_err());
        }
    }

    #[test]
    fn ownership() {
        let c = caller(Some(RoleName::Student));
        assert!(require_owner(&c, c.id(), "x").is_ok());
        assert!(require_owner(&c, Uuid::now_v7(), "x").is_err());
    }
}
