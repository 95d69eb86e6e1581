//! Sessions decoded from the auth provider's bearer tokens.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::AuthConfig;
use crate::core::shared::enums::Role;
use crate::security::error::AuthError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub exp: i64,
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Who is making the request. Anonymous when no valid token was presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub clerk_id: Option<String>,
    pub role: Option<Role>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(clerk_id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            clerk_id: Some(clerk_id.into()),
            role,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.clerk_id.is_some()
    }
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: Option<String>,
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl SessionKeys {
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 30;
        if let Some(issuer) = &config.issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            issuer: config.issuer.clone(),
        }
    }

    pub fn issue(&self, clerk_id: &str, role: Option<Role>, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: clerk_id.to_string(),
            role: role.map(|r| r.to_string()),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InternalError(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Session, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!("Rejected session token: {e}");
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            }
        })?;
        // An unrecognised role claim leaves the session without a role.
        let role = data.claims.role.as_deref().and_then(|r| r.parse().ok());
        Ok(Session::signed_in(data.claims.sub, role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> SessionKeys {
        SessionKeys::new(&AuthConfig {
            jwt_secret: "test-secret-key-with-enough-length!!".into(),
            issuer: Some("workly".into()),
            enforce_sessions: true,
        })
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let token = keys
            .issue("user_1", Some(Role::Employer), Duration::minutes(5))
            .unwrap();
        let session = keys.verify(&token).unwrap();
        assert_eq!(session, Session::signed_in("user_1", Some(Role::Employer)));
    }

    #[test]
    fn test_expired_token() {
        let keys = keys();
        let token = keys
            .issue("user_1", Some(Role::Admin), Duration::minutes(-10))
            .unwrap();
        assert_eq!(keys.verify(&token), Err(AuthError::ExpiredToken));
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token = keys()
            .issue("user_1", Some(Role::Admin), Duration::minutes(5))
            .unwrap();
        let other = SessionKeys::new(&AuthConfig {
            jwt_secret: "a-completely-different-secret-value".into(),
            issuer: Some("workly".into()),
            enforce_sessions: true,
        });
        assert_eq!(other.verify(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_unknown_role_claim_yields_no_role() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: "user_1".into(),
            role: Some("superuser".into()),
            exp: now + 60,
            iat: now,
            iss: Some("workly".into()),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding).unwrap();
        let session = keys.verify(&token).unwrap();
        assert!(session.is_signed_in());
        assert_eq!(session.role, None);
    }

    #[test]
    fn test_garbage_token() {
        assert_eq!(keys().verify("not.a.jwt"), Err(AuthError::InvalidToken));
    }
}
