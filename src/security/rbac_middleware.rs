use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::warn;

use crate::core::shared::enums::Role;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::caller::Caller;
use crate::security::error::AuthError;
use crate::security::session::Session;

const ANONYMOUS_PATHS: &[&str] = &[ApiUrls::HEALTH, ApiUrls::HEALTHZ, ApiUrls::WEBHOOKS];
const ADMIN_PREFIX: &str = "/admin/";

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// EventSource cannot set headers, so realtime clients may pass the token
/// as `?access_token=`.
fn query_token(query: Option<&str>) -> Option<String> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "access_token")
        .and_then(|(_, v)| urlencoding::decode(v).ok())
        .map(|v| v.into_owned())
}

pub fn is_anonymous_path(path: &str) -> bool {
    ANONYMOUS_PATHS.contains(&path)
}

/// `/admin/{id}/tickets` lists the caller's own tickets and is open to every
/// role; everything else under `/admin/` is admin-only.
pub fn is_admin_path(path: &str) -> bool {
    path.starts_with(ADMIN_PREFIX) && !path.trim_end_matches('/').ends_with("/tickets")
}

/// Attaches a `Caller` to every request. With `auth.enforce_sessions` on,
/// requests without a valid token get 401 and non-admin sessions on admin
/// routes get 403.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let enforce = state.config.auth.enforce_sessions;
    let path = request.uri().path().to_string();

    let token = bearer_token(request.headers())
        .map(str::to_string)
        .or_else(|| query_token(request.uri().query()));

    let session = match token.map(|t| state.session_keys.verify(&t)) {
        Some(Ok(session)) => session,
        Some(Err(e)) if enforce && !is_anonymous_path(&path) => return e.into_response(),
        Some(Err(e)) => {
            warn!("Ignoring invalid session token on {path}: {e}");
            Session::anonymous()
        }
        None if enforce && !is_anonymous_path(&path) => {
            return AuthError::MissingToken.into_response()
        }
        None => Session::anonymous(),
    };

    if enforce && is_admin_path(&path) && session.role != Some(Role::Admin) {
        return AuthError::InsufficientPermissions.into_response();
    }

    request.extensions_mut().insert(Caller::new(session, enforce));
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_query_token() {
        assert_eq!(
            query_token(Some("foo=1&access_token=a%2Eb")),
            Some("a.b".to_string())
        );
        assert_eq!(query_token(Some("foo=1")), None);
        assert_eq!(query_token(None), None);
    }

    #[test]
    fn test_path_classes() {
        assert!(is_anonymous_path("/health"));
        assert!(is_anonymous_path("/api/webhooks"));
        assert!(!is_anonymous_path("/tickets"));
        assert!(is_admin_path("/admin/ban/user_42"));
        assert!(is_admin_path("/admin/user_1/tickets/pending"));
        assert!(!is_admin_path("/admin/user_1/tickets"));
        assert!(!is_admin_path("/administrator"));
    }
}
