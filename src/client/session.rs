//! Signed-in identity handed to every view.

use super::error::ClientError;
use crate::core::shared::enums::Role;
use crate::security::guard::{authorize, landing_path, route_decision, GuardDecision};
use crate::security::session::{Session, SessionKeys};

/// Built once when the user authenticates and passed to the views that
/// need to know who is acting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    session: Session,
}

impl SessionContext {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(clerk_id: impl Into<String>, role: Option<Role>) -> Self {
        Self::new(Session::signed_in(clerk_id, role))
    }

    pub fn from_token(keys: &SessionKeys, token: &str) -> Result<Self, ClientError> {
        keys.verify(token)
            .map(Self::new)
            .map_err(|e| ClientError::Unauthorized(e.to_string()))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn role(&self) -> Option<Role> {
        self.session.role
    }

    pub fn clerk_id(&self) -> Result<&str, ClientError> {
        self.session
            .clerk_id
            .as_deref()
            .ok_or_else(|| ClientError::MissingConfig("no signed-in user".into()))
    }

    pub fn guard(&self, allowed: &[Role]) -> GuardDecision {
        authorize(&self.session, allowed)
    }

    /// Decision for navigating to `path`, dashboards included.
    pub fn route(&self, path: &str) -> GuardDecision {
        route_decision(path, &self.session)
    }

    /// Where the viewer lands after signing in.
    pub fn landing(&self) -> &'static str {
        landing_path(&self.session)
    }

    /// Clerk id of the viewer when their role is in `allowed`.
    pub fn require(&self, allowed: &[Role]) -> Result<&str, ClientError> {
        match self.guard(allowed) {
            GuardDecision::Allow => self.clerk_id(),
            GuardDecision::RedirectSignIn => {
                Err(ClientError::Unauthorized("sign in required".into()))
            }
            GuardDecision::RedirectHome => Err(ClientError::Unauthorized(format!(
                "role {} is not allowed here",
                self.role().map_or("none", |r| r.as_str())
            ))),
        }
    }
}
