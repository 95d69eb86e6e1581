//! Role-gated routing decisions for the dashboards.

use crate::core::shared::enums::Role;
use crate::security::session::Session;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const HOME_PATH: &str = "/";
pub const SELECT_ROLE_PATH: &str = "/select-role";

const PUBLIC_PREFIXES: &[&str] = &["/sign-in", "/sign-up", "/api/webhooks"];
const PUBLIC_EXACT: &[&str] = &["/", "/redirect"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    RedirectSignIn,
    RedirectHome,
    Allow,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            Self::RedirectSignIn => Some(SIGN_IN_PATH),
            Self::RedirectHome => Some(HOME_PATH),
            Self::Allow => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Dashboard(Role),
    Other,
}

/// Unauthenticated sessions go to sign-in; a role outside `allowed`, or no
/// role at all, goes home.
pub fn authorize(session: &Session, allowed: &[Role]) -> GuardDecision {
    if !session.is_signed_in() {
        return GuardDecision::RedirectSignIn;
    }
    match session.role {
        Some(role) if allowed.contains(&role) => GuardDecision::Allow,
        _ => GuardDecision::RedirectHome,
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/') || rest.starts_with('?'))
}

pub fn classify_route(path: &str) -> RouteClass {
    if PUBLIC_EXACT.contains(&path) || PUBLIC_PREFIXES.iter().any(|p| matches_prefix(path, p)) {
        return RouteClass::Public;
    }
    [Role::Admin, Role::Employer, Role::Freelancer]
        .into_iter()
        .find(|role| matches_prefix(path, role.dashboard_path()))
        .map_or(RouteClass::Other, RouteClass::Dashboard)
}

pub fn route_decision(path: &str, session: &Session) -> GuardDecision {
    match classify_route(path) {
        RouteClass::Public => GuardDecision::Allow,
        RouteClass::Dashboard(role) => authorize(session, &[role]),
        RouteClass::Other if session.is_signed_in() => GuardDecision::Allow,
        RouteClass::Other => GuardDecision::RedirectSignIn,
    }
}

/// Where `/redirect` sends a signed-in user.
pub fn landing_path(session: &Session) -> &'static str {
    match (session.is_signed_in(), session.role) {
        (false, _) => SIGN_IN_PATH,
        (true, Some(role)) => role.dashboard_path(),
        (true, None) => SELECT_ROLE_PATH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROLES: [Role; 3] = [Role::Admin, Role::Employer, Role::Freelancer];

    #[test]
    fn test_unauthenticated_goes_to_sign_in() {
        let decision = authorize(&Session::anonymous(), &[Role::Admin]);
        assert_eq!(decision, GuardDecision::RedirectSignIn);
        assert_eq!(decision.redirect_target(), Some("/sign-in"));
    }

    #[test]
    fn test_role_outside_allowed_set_never_allows() {
        let allowed_sets: [&[Role]; 4] = [
            &[],
            &[Role::Admin],
            &[Role::Employer, Role::Freelancer],
            &[Role::Freelancer],
        ];
        for allowed in allowed_sets {
            for role in ROLES {
                let decision = authorize(&Session::signed_in("u", Some(role)), allowed);
                assert_eq!(decision.is_allowed(), allowed.contains(&role));
                if !allowed.contains(&role) {
                    assert_eq!(decision, GuardDecision::RedirectHome);
                }
            }
        }
    }

    #[test]
    fn test_missing_role_claim_is_a_failure() {
        let session = Session::signed_in("u", None);
        assert_eq!(authorize(&session, &ROLES), GuardDecision::RedirectHome);
    }

    #[test]
    fn test_classify_route() {
        assert_eq!(classify_route("/"), RouteClass::Public);
        assert_eq!(classify_route("/sign-in/factor-one"), RouteClass::Public);
        assert_eq!(classify_route("/api/webhooks"), RouteClass::Public);
        assert_eq!(classify_route("/redirect"), RouteClass::Public);
        assert_eq!(
            classify_route("/admindashboard/tickets"),
            RouteClass::Dashboard(Role::Admin)
        );
        assert_eq!(
            classify_route("/employerdashboard"),
            RouteClass::Dashboard(Role::Employer)
        );
        assert_eq!(classify_route("/sign-inx"), RouteClass::Other);
        assert_eq!(classify_route("/gigs"), RouteClass::Other);
    }

    #[test]
    fn test_route_decision() {
        let employer = Session::signed_in("e", Some(Role::Employer));
        assert!(route_decision("/", &Session::anonymous()).is_allowed());
        assert!(route_decision("/employerdashboard", &employer).is_allowed());
        assert_eq!(
            route_decision("/admindashboard", &employer),
            GuardDecision::RedirectHome
        );
        assert_eq!(
            route_decision("/gigs", &Session::anonymous()),
            GuardDecision::RedirectSignIn
        );
        assert!(route_decision("/gigs", &employer).is_allowed());
    }

    #[test]
    fn test_landing_path() {
        assert_eq!(landing_path(&Session::anonymous()), "/sign-in");
        assert_eq!(landing_path(&Session::signed_in("u", None)), "/select-role");
        assert_eq!(
            landing_path(&Session::signed_in("u", Some(Role::Freelancer))),
            "/freelancerdashboard"
        );
    }
}
