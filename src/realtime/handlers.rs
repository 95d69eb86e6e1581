use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Router,
};
use futures::{stream, SinkExt, StreamExt};
use log::{info, warn};
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast::error::RecvError;

use super::hub::{ChannelEvent, ChannelHub, Subscription};
use crate::core::shared::error::{ApiError, ApiResult};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub fn configure_realtime_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::REALTIME_CHANNEL, get(handle_channel_sse))
        .route(ApiUrls::WS_CHANNEL, get(handle_channel_websocket))
}

fn to_sse_event(event: &ChannelEvent) -> Event {
    Event::default()
        .event(event.event.clone())
        .data(event.data.to_string())
}

fn ensure_known_channel(channel: &str) -> ApiResult<()> {
    if ChannelHub::parse_ticket_channel(channel).is_none() {
        return Err(ApiError::bad_request(format!(
            "Unknown channel {channel}; expected ticket-{{id}}"
        )));
    }
    Ok(())
}

/// Next event for an SSE client; `None` once the channel closes. Lagged
/// clients skip ahead instead of disconnecting.
async fn next_sse_event(mut subscription: Subscription) -> Option<(Result<Event, Infallible>, Subscription)> {
    loop {
        match subscription.recv().await {
            Ok(event) => return Some((Ok(to_sse_event(&event)), subscription)),
            Err(RecvError::Lagged(skipped)) => {
                warn!(
                    "SSE subscriber on {} lagged, skipped {skipped} events",
                    subscription.channel()
                );
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// The subscription lives inside the stream, so the channel is released
/// when the client disconnects and axum drops the body.
pub async fn handle_channel_sse(
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>> {
    ensure_known_channel(&channel)?;
    info!("SSE subscriber joined {channel}");
    let subscription = state.channels.subscribe(&channel).await;
    let events = stream::unfold(subscription, next_sse_event);

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(state.config.realtime.heartbeat_seconds))
            .text("keep-alive"),
    ))
}

pub async fn handle_channel_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(channel): Path<String>,
) -> ApiResult<Response> {
    ensure_known_channel(&channel)?;
    Ok(ws
        .on_upgrade(move |socket| handle_channel_connection(socket, state, channel))
        .into_response())
}

async fn handle_channel_connection(socket: WebSocket, state: Arc<AppState>, channel: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut subscription = state.channels.subscribe(&channel).await;
    info!("WebSocket subscriber joined {channel}");

    let channel_for_send = channel.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            match subscription.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("WebSocket subscriber on {channel_for_send} lagged, skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("WebSocket subscriber left {channel}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_only_ticket_channels_are_served() {
        assert!(ensure_known_channel("ticket-12").is_ok());
        for bad in ["lobby", "ticket-abc", "ticket-"] {
            let err = ensure_known_channel(bad).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        }
    }
}
