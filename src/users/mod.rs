mod webhook;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::Role;
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_user, User};
use crate::core::shared::schema::users;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::security::Caller;

pub use webhook::{handle_auth_webhook, user_from_event, AuthEvent, AuthEventData, EmailAddress};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub clerk_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

impl CreateUserRequest {
    pub fn into_user(self) -> ApiResult<User> {
        let role: Role = self.role.parse().map_err(|_| {
            ApiError::bad_request(format!(
                "Invalid role: {}. Must be one of admin, freelancer, employer",
                self.role
            ))
        })?;
        if self.clerk_id.trim().is_empty() {
            return Err(ApiError::bad_request("clerkId is required"));
        }
        if !self.email.contains('@') {
            return Err(ApiError::bad_request(format!("Invalid email: {}", self.email)));
        }
        Ok(User {
            clerk_id: self.clerk_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: Some(role),
            is_banned: false,
            created_at: Utc::now(),
        })
    }
}

/// Parses a role picked in the role-selection flow.
pub fn parse_selectable_role(raw: &str) -> ApiResult<Role> {
    raw.parse::<Role>()
        .ok()
        .filter(Role::is_self_selectable)
        .ok_or_else(|| ApiError::bad_request("Invalid role. Use 'employer' or 'freelancer'"))
}

pub fn ensure_unique(conn: &mut PgConnection, clerk_id: &str, email: &str) -> ApiResult<()> {
    let taken: i64 = users::table
        .filter(users::clerk_id.eq(clerk_id).or(users::email.eq(email)))
        .count()
        .get_result(conn)?;
    if taken > 0 {
        return Err(ApiError::Conflict(
            "User with this clerkId or email already exists".to_string(),
        ));
    }
    Ok(())
}

/// Only an admin session may create another admin.
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = req.into_user()?;
    if user.has_role(Role::Admin) {
        caller.ensure_admin()?;
    } else {
        caller.ensure_is_or_admin(&user.clerk_id)?;
    }

    let created = with_conn(&state.conn, move |conn| {
        ensure_unique(conn, &user.clerk_id, &user.email)?;
        diesel::insert_into(users::table)
            .values(&user)
            .execute(conn)?;
        Ok(user)
    })
    .await?;

    info!("Created user {}", created.clerk_id);
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<User>>> {
    let all = with_conn(&state.conn, |conn| {
        Ok(users::table
            .order(users::created_at.desc())
            .select(User::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(all))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<User>> {
    let user = with_conn(&state.conn, move |conn| find_user(conn, &clerk_id)).await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<StatusCode> {
    caller.ensure_is_or_admin(&clerk_id)?;
    let id = clerk_id.clone();
    let deleted = with_conn(&state.conn, move |conn| {
        Ok(diesel::delete(users::table.find(&id)).execute(conn)?)
    })
    .await?;
    if deleted == 0 {
        return Err(ApiError::not_found(format!("User with clerkId {clerk_id} not found")));
    }
    info!("Deleted user {clerk_id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_role(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<User>> {
    caller.ensure_is(&clerk_id)?;
    let role = parse_selectable_role(&req.role)?;

    let user = with_conn(&state.conn, move |conn| {
        find_user(conn, &clerk_id)?;
        Ok(diesel::update(users::table.find(&clerk_id))
            .set(users::role.eq(Some(role)))
            .returning(User::as_returning())
            .get_result::<User>(conn)?)
    })
    .await?;

    info!("User {} selected role {role}", user.clerk_id);
    Ok(Json(user))
}

pub fn configure_users_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::USERS, get(list_users).post(create_user))
        .route(ApiUrls::USERS_SLASH, get(list_users).post(create_user))
        .route(ApiUrls::USER_BY_ID, get(get_user).delete(delete_user))
        .route(ApiUrls::USER_BY_CLERK_ID, get(get_user))
        .route(ApiUrls::USER_ROLE, put(update_role))
        .route(ApiUrls::WEBHOOKS, post(handle_auth_webhook))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(role: &str) -> CreateUserRequest {
        CreateUserRequest {
            clerk_id: "user_1".into(),
            email: "ana@example.com".into(),
            first_name: "Ana".into(),
            last_name: "Silva".into(),
            role: role.into(),
        }
    }

    #[test]
    fn test_create_request_parses_role() {
        let user = request("EMPLOYER").into_user().unwrap();
        assert_eq!(user.role, Some(Role::Employer));
        assert!(!user.is_banned);
    }

    #[test]
    fn test_create_request_rejects_unknown_role() {
        let err = request("manager").into_user().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_create_request_accepts_camel_case_json() {
        let req: CreateUserRequest = serde_json::from_str(
            r#"{"clerkId":"user_9","email":"x@y.z","firstName":"X","lastName":"Y","role":"freelancer"}"#,
        )
        .unwrap();
        assert_eq!(req.clerk_id, "user_9");
    }

    #[test]
    fn test_role_selection_excludes_admin() {
        assert_eq!(parse_selectable_role("Employer").unwrap(), Role::Employer);
        assert!(parse_selectable_role("admin").is_err());
        assert!(parse_selectable_role("").is_err());
    }
}
