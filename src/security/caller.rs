//! The signed-in caller as seen by handlers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::core::shared::enums::Role;
use crate::core::shared::error::ApiError;
use crate::security::session::Session;

/// Request extension attached by `session_middleware`. Ownership checks only
/// bite when `auth.enforce_sessions` is on; otherwise every check passes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub session: Session,
    pub enforced: bool,
}

impl Caller {
    pub fn new(session: Session, enforced: bool) -> Self {
        Self { session, enforced }
    }

    pub fn clerk_id(&self) -> Option<&str> {
        self.session.clerk_id.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.session.role == Some(Role::Admin)
    }

    /// The caller must be the user `clerk_id` the request acts for.
    pub fn ensure_is(&self, clerk_id: &str) -> Result<(), ApiError> {
        if !self.enforced {
            return Ok(());
        }
        match self.clerk_id() {
            Some(id) if id == clerk_id => Ok(()),
            Some(id) => Err(ApiError::Forbidden(format!(
                "User {id} cannot act on behalf of {clerk_id}"
            ))),
            None => Err(ApiError::Unauthorized(
                "Authentication token is required".into(),
            )),
        }
    }

    pub fn ensure_admin(&self) -> Result<(), ApiError> {
        if !self.enforced {
            return Ok(());
        }
        match self.clerk_id() {
            None => Err(ApiError::Unauthorized(
                "Authentication token is required".into(),
            )),
            Some(_) if self.is_admin() => Ok(()),
            Some(_) => Err(ApiError::Forbidden("Admin privileges required".into())),
        }
    }

    /// Either the user themselves or an admin.
    pub fn ensure_is_or_admin(&self, clerk_id: &str) -> Result<(), ApiError> {
        if self.enforced && self.is_admin() && self.clerk_id().is_some() {
            return Ok(());
        }
        self.ensure_is(clerk_id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("Session context not available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn enforced(clerk_id: &str, role: Role) -> Caller {
        Caller::new(Session::signed_in(clerk_id, Some(role)), true)
    }

    #[test]
    fn test_unenforced_caller_passes_every_check() {
        let caller = Caller::new(Session::anonymous(), false);
        assert!(caller.ensure_is("emp_1").is_ok());
        assert!(caller.ensure_admin().is_ok());
        assert!(caller.ensure_is_or_admin("emp_1").is_ok());
    }

    #[test]
    fn test_caller_may_only_act_for_themselves() {
        let caller = enforced("free_1", Role::Freelancer);
        assert!(caller.ensure_is("free_1").is_ok());
        let err = caller.ensure_is("emp_1").unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            caller.ensure_admin().unwrap_err().status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_anonymous_enforced_caller_is_unauthorized() {
        let caller = Caller::new(Session::anonymous(), true);
        assert_eq!(
            caller.ensure_is("emp_1").unwrap_err().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            caller.ensure_admin().unwrap_err().status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_admin_may_act_for_others_only_where_allowed() {
        let admin = enforced("admin_1", Role::Admin);
        assert!(admin.ensure_admin().is_ok());
        assert!(admin.ensure_is_or_admin("emp_1").is_ok());
        assert!(admin.ensure_is("emp_1").is_err());
    }
}
