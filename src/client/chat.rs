//! Message list of one ticket's chat.

use async_trait::async_trait;

use super::error::ClientError;
use crate::chat::ChatMessage;

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn chat_history(&self, ticket_id: i32) -> Result<Vec<ChatMessage>, ClientError>;
    async fn post_message(
        &self,
        ticket_id: i32,
        sender_id: &str,
        message: &str,
    ) -> Result<ChatMessage, ClientError>;
}

/// History first, then live events in the order they arrived. Messages
/// are not de-duplicated: one delivered both ways shows twice.
#[derive(Debug, Clone)]
pub struct ChatFeed {
    ticket_id: i32,
    history: Vec<ChatMessage>,
    live: Vec<ChatMessage>,
    error: Option<String>,
}

impl ChatFeed {
    pub fn new(ticket_id: i32) -> Self {
        Self {
            ticket_id,
            history: Vec::new(),
            live: Vec::new(),
            error: None,
        }
    }

    pub fn ticket_id(&self) -> i32 {
        self.ticket_id
    }

    pub fn messages(&self) -> Vec<&ChatMessage> {
        self.history.iter().chain(self.live.iter()).collect()
    }

    pub fn len(&self) -> usize {
        self.history.len() + self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub async fn load_history(&mut self, api: &dyn ChatApi) {
        self.error = None;
        match api.chat_history(self.ticket_id).await {
            Ok(history) => self.history = history,
            Err(e) => self.error = Some(e.to_string()),
        }
    }

    pub fn push_live(&mut self, message: ChatMessage) {
        self.live.push(message);
    }

    /// Posts without echoing; the message shows up when the realtime
    /// event for it arrives.
    pub async fn send(&mut self, api: &dyn ChatApi, sender_id: &str, text: &str) {
        self.error = None;
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Err(e) = api.post_message(self.ticket_id, sender_id, text).await {
            self.error = Some(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;

    fn message(id: i32, text: &str) -> ChatMessage {
        ChatMessage {
            id,
            ticket_id: 5,
            sender_id: "user_1".into(),
            sender_name: "Ana Silva".into(),
            message: text.into(),
            timestamp: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FakeChat {
        history: Vec<ChatMessage>,
        posted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn chat_history(&self, _ticket_id: i32) -> Result<Vec<ChatMessage>, ClientError> {
            Ok(self.history.clone())
        }

        async fn post_message(
            &self,
            ticket_id: i32,
            _sender_id: &str,
            text: &str,
        ) -> Result<ChatMessage, ClientError> {
            self.posted.lock().unwrap().push(text.to_string());
            Ok(message(100, text)).map(|mut m| {
                m.ticket_id = ticket_id;
                m
            })
        }
    }

    #[tokio::test]
    async fn test_history_then_live_in_arrival_order() {
        let api = FakeChat {
            history: vec![message(1, "hello"), message(2, "anyone?")],
            ..Default::default()
        };
        let mut feed = ChatFeed::new(5);
        feed.push_live(message(3, "early live"));
        feed.load_history(&api).await;
        feed.push_live(message(4, "later live"));

        let texts: Vec<&str> = feed.messages().iter().map(|m| m.message.as_str()).collect();
        assert_eq!(texts, vec!["hello", "anyone?", "early live", "later live"]);
    }

    #[tokio::test]
    async fn test_no_deduplication() {
        let api = FakeChat {
            history: vec![message(1, "hello")],
            ..Default::default()
        };
        let mut feed = ChatFeed::new(5);
        feed.load_history(&api).await;
        feed.push_live(message(1, "hello"));
        assert_eq!(feed.len(), 2);
    }

    #[tokio::test]
    async fn test_send_does_not_echo() {
        let api = FakeChat::default();
        let mut feed = ChatFeed::new(5);
        feed.send(&api, "user_1", "  ping  ").await;
        feed.send(&api, "user_1", "   ").await;
        assert!(feed.is_empty());
        assert_eq!(*api.posted.lock().unwrap(), vec!["ping"]);
    }
}
