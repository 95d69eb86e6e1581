//! HTTP server initialization and routing

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use log::{error, info, warn};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::config::CorsConfig;
use crate::core::shared::state::AppState;
use crate::security::session_middleware;

use super::{configure_health_routes, shutdown_signal};

/// No configured origins means any origin; otherwise only the listed ones.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        base.allow_origin(Any)
    } else {
        info!("CORS restricted to {} origins", origins.len());
        base.allow_origin(origins)
    }
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(configure_health_routes())
        .merge(crate::users::configure_users_routes())
        .merge(crate::tickets::configure_tickets_routes())
        .merge(crate::chat::configure_chat_routes())
        .merge(crate::realtime::configure_realtime_routes())
        .merge(crate::gigs::configure_gigs_routes())
        .merge(crate::profiles::configure_profiles_routes())
        .merge(crate::billing::configure_billing_routes())
        .merge(crate::reviews::configure_reviews_routes());

    let cors = create_cors_layer(&app_state.config.cors);

    // Layers run last-added first: trace, then CORS, then the session.
    api_router
        .layer(axum::middleware::from_fn_with_state(
            app_state.clone(),
            session_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {addr}: {e} - is another instance running?");
            return Err(e);
        }
    };
    info!("HTTP server listening on {addr}");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
