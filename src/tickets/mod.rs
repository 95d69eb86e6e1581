//! Support tickets and the admin actions over them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::enums::{Role, TicketStatus, Urgency};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::{find_phone, find_user, find_user_with_role, User};
use crate::core::shared::schema::{tickets, users};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::notify::Notification;
use crate::security::Caller;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = tickets)]
pub struct Ticket {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub urgency: Urgency,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = tickets)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub urgency: Urgency,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub urgency: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusResponse {
    pub message: String,
    pub id: i32,
    pub status: TicketStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanRequest {
    pub admin_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanResponse {
    pub message: String,
    pub clerk_id: String,
    pub banned_at: DateTime<Utc>,
}

impl CreateTicketRequest {
    pub fn validate(self) -> ApiResult<NewTicket> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(ApiError::bad_request("title and description are required"));
        }
        if self.created_by.trim().is_empty() {
            return Err(ApiError::bad_request("created_by is required"));
        }
        let urgency = match self.urgency.as_deref() {
            None | Some("") => Urgency::default(),
            Some(raw) => raw.parse().map_err(|_| {
                ApiError::bad_request(format!("Invalid urgency: {raw}. Use low, medium or high"))
            })?,
        };
        Ok(NewTicket {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            status: TicketStatus::default(),
            urgency,
            created_by: self.created_by,
        })
    }
}

/// Parses an admin-chosen outcome; only accepted, rejected and resolved.
pub fn parse_admin_outcome(raw: Option<&str>) -> ApiResult<TicketStatus> {
    let raw = raw.ok_or_else(|| ApiError::bad_request("Missing required 'status' in request body"))?;
    raw.parse::<TicketStatus>()
        .ok()
        .filter(TicketStatus::is_admin_outcome)
        .ok_or_else(|| {
            ApiError::bad_request("Invalid status. Use 'accepted', 'rejected' or 'resolved'")
        })
}

fn require_admin(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<User> {
    find_user_with_role(conn, clerk_id, Role::Admin)
        .map_err(|e| match e {
            ApiError::Forbidden(_) => ApiError::Forbidden("Unauthorized: User is not an admin".into()),
            other => other,
        })
}

fn load_ticket(conn: &mut PgConnection, ticket_id: i32) -> ApiResult<Ticket> {
    tickets::table
        .find(ticket_id)
        .select(Ticket::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("Ticket {ticket_id} not found")))
}

/// Tickets awaiting review whose creator is not banned, oldest first.
fn load_pending(conn: &mut PgConnection) -> ApiResult<Vec<Ticket>> {
    Ok(tickets::table
        .inner_join(users::table)
        .filter(tickets::status.eq_any(vec![TicketStatus::Pending, TicketStatus::Open]))
        .filter(users::is_banned.eq(false))
        .order(tickets::created_at.asc())
        .select(Ticket::as_select())
        .load(conn)?)
}

fn load_created_by(conn: &mut PgConnection, clerk_id: &str) -> ApiResult<Vec<Ticket>> {
    Ok(tickets::table
        .filter(tickets::created_by.eq(clerk_id))
        .order(tickets::created_at.desc())
        .select(Ticket::as_select())
        .load(conn)?)
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Json(req): Json<CreateTicketRequest>,
) -> ApiResult<(StatusCode, Json<Ticket>)> {
    caller.ensure_is(&req.created_by)?;
    let new_ticket = req.validate()?;

    let (ticket, phone) = with_conn(&state.conn, move |conn| {
        let creator = find_user(conn, &new_ticket.created_by)?;
        if creator.is_banned {
            return Err(ApiError::Forbidden("Banned users cannot open tickets".into()));
        }
        if creator.has_role(Role::Admin) {
            return Err(ApiError::Forbidden("Administrators cannot open tickets".into()));
        }
        let ticket = diesel::insert_into(tickets::table)
            .values(&new_ticket)
            .returning(Ticket::as_returning())
            .get_result::<Ticket>(conn)?;
        let phone = find_phone(conn, &creator.clerk_id)?;
        Ok((ticket, phone))
    })
    .await?;

    info!("Ticket {} opened by {}", ticket.id, ticket.created_by);
    state
        .notify(
            phone.as_deref(),
            Notification::TicketCreated {
                ticket_id: ticket.id,
                title: ticket.title.clone(),
            },
        )
        .await;

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn user_tickets(
    State(state): State<Arc<AppState>>,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Vec<Ticket>>> {
    let list = with_conn(&state.conn, move |conn| {
        find_user(conn, &clerk_id)?;
        load_created_by(conn, &clerk_id)
    })
    .await?;
    Ok(Json(list))
}

pub async fn pending_tickets(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Ticket>>> {
    let list = with_conn(&state.conn, load_pending).await?;
    Ok(Json(list))
}

pub async fn admin_all_tickets(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Vec<Ticket>>> {
    caller.ensure_is(&clerk_id)?;
    let list = with_conn(&state.conn, move |conn| {
        require_admin(conn, &clerk_id)?;
        Ok(tickets::table
            .order(tickets::created_at.desc())
            .select(Ticket::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(list))
}

pub async fn admin_pending_tickets(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
) -> ApiResult<Json<Vec<Ticket>>> {
    caller.ensure_is(&clerk_id)?;
    let list = with_conn(&state.conn, move |conn| {
        require_admin(conn, &clerk_id)?;
        load_pending(conn)
    })
    .await?;
    Ok(Json(list))
}

pub async fn update_ticket_status(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path((clerk_id, ticket_id)): Path<(String, i32)>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Json<UpdateStatusResponse>> {
    caller.ensure_is(&clerk_id)?;
    let next = parse_admin_outcome(req.status.as_deref())?;

    let ticket = with_conn(&state.conn, move |conn| {
        conn.transaction(|conn| {
            require_admin(conn, &clerk_id)?;
            let current = load_ticket(conn, ticket_id)?;
            if !current.status.can_transition_to(next) {
                return Err(ApiError::Conflict(format!(
                    "Ticket {ticket_id} is already {}",
                    current.status
                )));
            }
            Ok(diesel::update(tickets::table.find(ticket_id))
                .set((tickets::status.eq(next), tickets::updated_at.eq(Utc::now())))
                .returning(Ticket::as_returning())
                .get_result::<Ticket>(conn)?)
        })
    })
    .await?;

    info!("Ticket {} status updated to {}", ticket.id, ticket.status);
    Ok(Json(UpdateStatusResponse {
        message: format!("Ticket {} status updated to {}", ticket.id, ticket.status),
        id: ticket.id,
        status: ticket.status,
        updated_at: ticket.updated_at,
    }))
}

pub async fn ban_user(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(clerk_id): Path<String>,
    Json(req): Json<BanRequest>,
) -> ApiResult<Json<BanResponse>> {
    caller.ensure_is(&req.admin_id)?;
    let target = clerk_id.clone();
    with_conn(&state.conn, move |conn| {
        require_admin(conn, &req.admin_id)?;
        let user = find_user(conn, &target)?;
        if user.has_role(Role::Admin) {
            return Err(ApiError::bad_request("Administrators cannot be banned"));
        }
        diesel::update(users::table.find(&target))
            .set(users::is_banned.eq(true))
            .execute(conn)?;
        Ok(())
    })
    .await?;

    info!("User {clerk_id} banned");
    Ok(Json(BanResponse {
        message: format!("User {clerk_id} has been banned"),
        clerk_id,
        banned_at: Utc::now(),
    }))
}

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::TICKETS, post(create_ticket))
        .route(ApiUrls::TICKETS_BY_USER, get(user_tickets))
        .route(ApiUrls::TICKETS_PENDING, get(pending_tickets))
        .route(ApiUrls::ADMIN_TICKETS, get(user_tickets))
        .route(ApiUrls::ADMIN_TICKETS_ALL, get(admin_all_tickets))
        .route(ApiUrls::ADMIN_TICKETS_PENDING, get(admin_pending_tickets))
        .route(ApiUrls::ADMIN_TICKET_STATUS, post(update_ticket_status))
        .route(ApiUrls::ADMIN_BAN, post(ban_user))
}
