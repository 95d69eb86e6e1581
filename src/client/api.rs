//! Typed REST client for the marketplace API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use super::chat::ChatApi;
use super::dashboard::{TicketApi, TicketDraft};
use super::error::ClientError;
use super::gigs::{GigApi, GigFilter};
use crate::chat::{ChatMessage, PostMessageRequest};
use crate::core::shared::enums::TicketStatus;
use crate::core::shared::models::User;
use crate::gigs::Gig;
use crate::tickets::{BanResponse, Ticket, UpdateStatusResponse};

pub const BASE_URL_ENV: &str = "WORKLY_API_BASE";
pub const TOKEN_ENV: &str = "WORKLY_ACCESS_TOKEN";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            access_token: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ClientError::MissingConfig(format!("{BASE_URL_ENV} is not set")))?;
        let mut config = Self::new(base_url);
        config.access_token = std::env::var(TOKEN_ENV).ok().filter(|v| !v.is_empty());
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct WorklyClient {
    http: Client,
    base_url: String,
    access_token: Option<String>,
}

impl WorklyClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ClientError::MissingConfig("API base URL is empty".into()));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url,
            access_token: config.access_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Request with the bearer token attached when one is configured.
    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub(crate) async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_body(status.as_u16(), &body))
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = Self::check(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send(self.request(reqwest::Method::GET, path)).await
    }

    pub async fn get_user(&self, clerk_id: &str) -> Result<User, ClientError> {
        self.get(&format!("/users/clerk/{}", urlencoding::encode(clerk_id)))
            .await
    }

    pub async fn user_tickets(&self, clerk_id: &str) -> Result<Vec<Ticket>, ClientError> {
        self.get(&format!("/tickets/user/{}", urlencoding::encode(clerk_id)))
            .await
    }

    pub async fn pending_tickets(&self) -> Result<Vec<Ticket>, ClientError> {
        self.get("/tickets/pending").await
    }

    pub async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, ClientError> {
        self.send(self.request(reqwest::Method::POST, "/tickets").json(draft))
            .await
    }

    pub async fn update_ticket_status(
        &self,
        admin_id: &str,
        ticket_id: i32,
        status: TicketStatus,
    ) -> Result<UpdateStatusResponse, ClientError> {
        let path = format!(
            "/admin/{}/tickets/{ticket_id}/update-status",
            urlencoding::encode(admin_id)
        );
        self.send(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "status": status })),
        )
        .await
    }

    pub async fn ban_user(&self, admin_id: &str, clerk_id: &str) -> Result<BanResponse, ClientError> {
        let path = format!("/admin/ban/{}", urlencoding::encode(clerk_id));
        self.send(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "admin_id": admin_id })),
        )
        .await
    }

    pub async fn chat_history(&self, ticket_id: i32) -> Result<Vec<ChatMessage>, ClientError> {
        self.get(&format!("/chat/{ticket_id}/messages")).await
    }

    pub async fn post_message(
        &self,
        ticket_id: i32,
        sender_id: &str,
        message: &str,
    ) -> Result<ChatMessage, ClientError> {
        let body = PostMessageRequest {
            sender_id: sender_id.to_string(),
            message: message.to_string(),
        };
        self.send(
            self.request(reqwest::Method::POST, &format!("/chat/{ticket_id}/messages"))
                .json(&body),
        )
        .await
    }

    pub async fn list_gigs(&self, filter: &GigFilter) -> Result<Vec<Gig>, ClientError> {
        self.get(&filter.path()).await
    }
}

#[async_trait]
impl TicketApi for WorklyClient {
    async fn get_user(&self, clerk_id: &str) -> Result<User, ClientError> {
        WorklyClient::get_user(self, clerk_id).await
    }

    async fn user_tickets(&self, clerk_id: &str) -> Result<Vec<Ticket>, ClientError> {
        WorklyClient::user_tickets(self, clerk_id).await
    }

    async fn pending_tickets(&self) -> Result<Vec<Ticket>, ClientError> {
        WorklyClient::pending_tickets(self).await
    }

    async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, ClientError> {
        WorklyClient::create_ticket(self, draft).await
    }

    async fn update_ticket_status(
        &self,
        admin_id: &str,
        ticket_id: i32,
        status: TicketStatus,
    ) -> Result<(), ClientError> {
        WorklyClient::update_ticket_status(self, admin_id, ticket_id, status)
            .await
            .map(|_| ())
    }

    async fn ban_user(&self, admin_id: &str, clerk_id: &str) -> Result<(), ClientError> {
        WorklyClient::ban_user(self, admin_id, clerk_id).await.map(|_| ())
    }
}

#[async_trait]
impl ChatApi for WorklyClient {
    async fn chat_history(&self, ticket_id: i32) -> Result<Vec<ChatMessage>, ClientError> {
        WorklyClient::chat_history(self, ticket_id).await
    }

    async fn post_message(
        &self,
        ticket_id: i32,
        sender_id: &str,
        message: &str,
    ) -> Result<ChatMessage, ClientError> {
        WorklyClient::post_message(self, ticket_id, sender_id, message).await
    }
}

#[async_trait]
impl GigApi for WorklyClient {
    async fn list_gigs(&self, filter: &GigFilter) -> Result<Vec<Gig>, ClientError> {
        WorklyClient::list_gigs(self, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(server: &mockito::Server) -> WorklyClient {
        WorklyClient::new(ClientConfig::new(server.url()).with_token("tok")).unwrap()
    }

    #[test]
    fn test_empty_base_url_is_missing_config() {
        let err = WorklyClient::new(ClientConfig::new("  ")).unwrap_err();
        assert!(matches!(err, ClientError::MissingConfig(_)));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = WorklyClient::new(ClientConfig::new("http://localhost:8000/")).unwrap();
        assert_eq!(client.url("/tickets"), "http://localhost:8000/tickets");
    }

    #[tokio::test]
    async fn test_get_user_sends_bearer_and_decodes() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/users/clerk/user_42")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "clerkId": "user_42",
                    "email": "ana@example.com",
                    "firstName": "Ana",
                    "lastName": "Silva",
                    "role": "admin",
                    "isBanned": false,
                    "createdAt": "2026-01-02T03:04:05Z"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let user = client(&server).get_user("user_42").await.unwrap();
        assert_eq!(user.clerk_id, "user_42");
        assert_eq!(user.role, Some(crate::core::shared::enums::Role::Admin));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_carries_server_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/admin/admin_1/tickets/4/update-status")
            .with_status(409)
            .with_body(r#"{"error":"conflict","message":"Ticket 4 is already resolved"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .update_ticket_status("admin_1", 4, TicketStatus::Resolved)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("already resolved"));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/tickets/pending")
            .with_status(200)
            .with_body(r#"{"not": "a list"}"#)
            .create_async()
            .await;

        let err = client(&server).pending_tickets().await.unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
