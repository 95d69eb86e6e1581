use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use diesel::prelude::*;
use diesel::upsert::excluded;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::User;
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::security::webhook::{WebhookError, WebhookHeaders, WebhookVerifier};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: AuthEventData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthEventData {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub public_metadata: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub id: Option<String>,
    pub email_address: String,
}

impl AuthEventData {
    /// The address flagged as primary, else the first one listed.
    pub fn primary_email(&self) -> Option<&str> {
        let primary = self.primary_email_address_id.as_deref().and_then(|wanted| {
            self.email_addresses
                .iter()
                .find(|e| e.id.as_deref() == Some(wanted))
        });
        primary
            .or_else(|| self.email_addresses.first())
            .map(|e| e.email_address.as_str())
            .filter(|e| !e.is_empty())
    }

    pub fn role(&self) -> Option<Role> {
        self.public_metadata
            .get("role")
            .and_then(Value::as_str)
            .and_then(|r| r.parse().ok())
    }
}

/// Maps a provider event onto the local user row. `Ok(None)` for event types
/// that do not touch users.
pub fn user_from_event(event: &AuthEvent) -> ApiResult<Option<User>> {
    if !matches!(event.event_type.as_str(), "user.created" | "user.updated") {
        return Ok(None);
    }
    let email = event
        .data
        .primary_email()
        .ok_or_else(|| ApiError::bad_request("Error: Missing required fields"))?;

    Ok(Some(User {
        clerk_id: event.data.id.clone(),
        email: email.to_string(),
        first_name: event.data.first_name.clone().unwrap_or_default(),
        last_name: event.data.last_name.clone().unwrap_or_default(),
        role: event.data.role(),
        is_banned: false,
        created_at: Utc::now(),
    }))
}

fn webhook_error(e: WebhookError) -> ApiError {
    match e {
        WebhookError::MissingHeaders | WebhookError::InvalidTimestamp => {
            ApiError::bad_request(e.to_string())
        }
        WebhookError::Expired | WebhookError::InvalidSignature => {
            ApiError::Unauthorized(e.to_string())
        }
        WebhookError::InvalidSecret => ApiError::Internal(e.to_string()),
    }
}

/// Upserts on the clerk id. Ban flag and creation time are never touched by
/// provider events; the role only when the event carries one.
fn upsert_user(conn: &mut PgConnection, user: &User) -> ApiResult<()> {
    let email_owner: Option<String> = users::table
        .filter(users::email.eq(&user.email))
        .filter(users::clerk_id.ne(&user.clerk_id))
        .select(users::clerk_id)
        .first(conn)
        .optional()?;
    if let Some(owner) = email_owner {
        return Err(ApiError::Conflict(format!(
            "Email {} already belongs to user {owner}",
            user.email
        )));
    }

    let insert = diesel::insert_into(users::table)
        .values(user)
        .on_conflict(users::clerk_id)
        .do_update();
    if user.role.is_some() {
        insert
            .set((
                users::email.eq(excluded(users::email)),
                users::first_name.eq(excluded(users::first_name)),
                users::last_name.eq(excluded(users::last_name)),
                users::role.eq(excluded(users::role)),
            ))
            .execute(conn)?;
    } else {
        insert
            .set((
                users::email.eq(excluded(users::email)),
                users::first_name.eq(excluded(users::first_name)),
                users::last_name.eq(excluded(users::last_name)),
            ))
            .execute(conn)?;
    }
    Ok(())
}

pub async fn handle_auth_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let secret = state.config.webhook.signing_secret.as_deref().ok_or_else(|| {
        ApiError::Internal(
            "Error: Please add SIGNING_SECRET from the auth provider to .env".to_string(),
        )
    })?;
    let verifier = WebhookVerifier::from_secret(secret, state.config.webhook.tolerance_seconds)
        .map_err(webhook_error)?;
    let webhook_headers = WebhookHeaders::from_headers(&headers).map_err(webhook_error)?;
    verifier
        .verify(&webhook_headers, &body, Utc::now().timestamp())
        .map_err(webhook_error)?;

    let event: AuthEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("Invalid webhook payload: {e}")))?;
    info!(
        "Received webhook {} with ID {} and event type of {}",
        webhook_headers.id, event.data.id, event.event_type
    );

    let Some(user) = user_from_event(&event)? else {
        warn!("Ignoring webhook event type {}", event.event_type);
        return Ok((
            StatusCode::OK,
            Json(json!({ "message": "Webhook received", "action": "ignored" })),
        ));
    };

    let clerk_id = user.clerk_id.clone();
    with_conn(&state.conn, move |conn| upsert_user(conn, &user)).await?;
    info!("Upserted user {clerk_id} from {}", event.event_type);

    Ok((
        StatusCode::OK,
        Json(json!({ "message": "Webhook received", "action": "upserted", "clerkId": clerk_id })),
    ))
}
