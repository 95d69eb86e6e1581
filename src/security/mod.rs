pub mod caller;
pub mod error;
pub mod guard;
pub mod rbac_middleware;
pub mod session;
pub mod webhook;

pub use caller::Caller;
pub use error::AuthError;
pub use guard::{authorize, classify_route, landing_path, route_decision, GuardDecision, RouteClass};
pub use rbac_middleware::session_middleware;
pub use session::{Session, SessionClaims, SessionKeys};
pub use webhook::{WebhookError, WebhookHeaders, WebhookVerifier};
