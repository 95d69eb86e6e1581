//! Per-ticket chat. Stored messages are fanned out on the ticket's realtime
//! channel before the POST returns.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::models::find_user;
use crate::core::shared::schema::{chat_messages, tickets};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::with_conn;
use crate::core::urls::ApiUrls;
use crate::realtime::{ChannelEvent, ChannelHub, NEW_MESSAGE_EVENT};
use crate::security::Caller;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = chat_messages)]
pub struct ChatMessage {
    pub id: i32,
    pub ticket_id: i32,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = chat_messages)]
struct NewChatMessage {
    ticket_id: i32,
    sender_id: String,
    sender_name: String,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageRequest {
    pub sender_id: String,
    pub message: String,
}

impl PostMessageRequest {
    /// The trimmed message text; sender and text are both required.
    pub fn text(&self) -> ApiResult<String> {
        let text = self.message.trim();
        if text.is_empty() || self.sender_id.trim().is_empty() {
            return Err(ApiError::bad_request("Missing required fields"));
        }
        Ok(text.to_string())
    }
}

fn ensure_ticket(conn: &mut PgConnection, ticket_id: i32) -> ApiResult<()> {
    let exists: i64 = tickets::table
        .filter(tickets::id.eq(ticket_id))
        .count()
        .get_result(conn)?;
    if exists == 0 {
        return Err(ApiError::not_found(format!("Ticket {ticket_id} not found")));
    }
    Ok(())
}

pub async fn post_message(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(ticket_id): Path<i32>,
    Json(req): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<ChatMessage>)> {
    let text = req.text()?;
    caller.ensure_is(&req.sender_id)?;

    let stored = with_conn(&state.conn, move |conn| {
        ensure_ticket(conn, ticket_id)?;
        let sender = find_user(conn, &req.sender_id)?;
        if sender.is_banned {
            return Err(ApiError::Forbidden("Banned users cannot send messages".into()));
        }
        Ok(diesel::insert_into(chat_messages::table)
            .values(&NewChatMessage {
                ticket_id,
                sender_name: sender.display_name(),
                sender_id: sender.clerk_id,
                message: text,
            })
            .returning(ChatMessage::as_returning())
            .get_result::<ChatMessage>(conn)?)
    })
    .await?;

    match serde_json::to_value(&stored) {
        Ok(data) => {
            let channel = ChannelHub::ticket_channel(ticket_id);
            let delivered = state
                .channels
                .publish(&channel, ChannelEvent::new(NEW_MESSAGE_EVENT, data))
                .await;
            info!("Message {} on {channel} pushed to {delivered} subscribers", stored.id);
        }
        Err(e) => error!("Failed to encode message {} for push: {e}", stored.id),
    }

    Ok((StatusCode::CREATED, Json(stored)))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<i32>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let history = with_conn(&state.conn, move |conn| {
        ensure_ticket(conn, ticket_id)?;
        Ok(chat_messages::table
            .filter(chat_messages::ticket_id.eq(ticket_id))
            .order((chat_messages::timestamp.asc(), chat_messages::id.asc()))
            .select(ChatMessage::as_select())
            .load(conn)?)
    })
    .await?;
    Ok(Json(history))
}

pub fn configure_chat_routes() -> Router<Arc<AppState>> {
    Router::new().route(ApiUrls::CHAT_MESSAGES, get(list_messages).post(post_message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn request(sender_id: &str, message: &str) -> PostMessageRequest {
        PostMessageRequest {
            sender_id: sender_id.into(),
            message: message.into(),
        }
    }

    #[test]
    fn test_message_text_is_trimmed() {
        assert_eq!(request("user_7", "  hello there \n").text().unwrap(), "hello there");
    }

    #[test]
    fn test_blank_message_or_sender_is_rejected() {
        for req in [request("user_7", "   "), request(" ", "hi"), request("", "")] {
            let err = req.text().unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_message_serializes_for_the_channel() {
        let message = ChatMessage {
            id: 4,
            ticket_id: 12,
            sender_id: "user_7".into(),
            sender_name: "Ada Lovelace".into(),
            message: "a b".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["ticket_id"], 12);
        assert_eq!(value["message"], "a b");
        assert_eq!(ChannelHub::ticket_channel(message.ticket_id), "ticket-12");
    }
}
