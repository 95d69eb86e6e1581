//! Live chat events over the server's SSE endpoint.

use futures_util::StreamExt;
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::api::WorklyClient;
use super::error::ClientError;
use crate::chat::ChatMessage;
use crate::realtime::{ChannelHub, NEW_MESSAGE_EVENT};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder. Chunks may split lines and
/// events anywhere; complete events are returned as their blank line
/// arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: String,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buffer.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let mut line: String = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        let event = SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.id.take(),
        };
        Some(event)
    }
}

/// Drains the longest valid UTF-8 prefix, keeping a split trailing
/// character for the next chunk.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => {
            let text = String::from_utf8_lossy(pending).into_owned();
            pending.clear();
            return text;
        }
    };
    let rest = pending.split_off(valid);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

/// `None` for events other than chat messages, such as keep-alives.
pub fn decode_chat_event(event: &SseEvent) -> Option<Result<ChatMessage, ClientError>> {
    if event.event.as_deref() != Some(NEW_MESSAGE_EVENT) {
        return None;
    }
    Some(serde_json::from_str(&event.data).map_err(ClientError::from))
}

/// Subscription to one ticket's channel. Messages arrive in publish order;
/// the reader task stops when the subscription is dropped.
pub struct ChatSubscription {
    ticket_id: i32,
    rx: mpsc::Receiver<Result<ChatMessage, ClientError>>,
    task: JoinHandle<()>,
}

impl ChatSubscription {
    pub async fn open(client: &WorklyClient, ticket_id: i32) -> Result<Self, ClientError> {
        let path = format!("/realtime/{}", ChannelHub::ticket_channel(ticket_id));
        let response = client
            .request(reqwest::Method::GET, &path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let response = WorklyClient::check(response).await?;

        let (tx, rx) = mpsc::channel(64);
        let task = tokio::spawn(async move {
            let mut parser = SseParser::new();
            let mut pending: Vec<u8> = Vec::new();
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Chat stream for ticket {ticket_id} failed: {e}");
                        let _ = tx.send(Err(ClientError::from(e))).await;
                        return;
                    }
                };
                pending.extend_from_slice(&chunk);
                let text = take_utf8(&mut pending);
                for event in parser.feed(&text) {
                    if let Some(decoded) = decode_chat_event(&event) {
                        if tx.send(decoded).await.is_err() {
                            return;
                        }
                    }
                }
            }
            debug!("Chat stream for ticket {ticket_id} closed");
        });

        Ok(Self { ticket_id, rx, task })
    }

    pub fn ticket_id(&self) -> i32 {
        self.ticket_id
    }

    /// Next live message, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<ChatMessage, ClientError>> {
        self.rx.recv().await
    }
}

impl Drop for ChatSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
