//! Ticket lists behind the admin, employer and freelancer dashboards.

use async_trait::async_trait;

use super::error::ClientError;
use crate::core::shared::enums::{Role, TicketStatus};
use crate::core::shared::models::User;
use crate::tickets::{CreateTicketRequest, Ticket};

pub type TicketDraft = CreateTicketRequest;

#[async_trait]
pub trait TicketApi: Send + Sync {
    async fn get_user(&self, clerk_id: &str) -> Result<User, ClientError>;
    async fn user_tickets(&self, clerk_id: &str) -> Result<Vec<Ticket>, ClientError>;
    async fn pending_tickets(&self) -> Result<Vec<Ticket>, ClientError>;
    async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, ClientError>;
    async fn update_ticket_status(
        &self,
        admin_id: &str,
        ticket_id: i32,
        status: TicketStatus,
    ) -> Result<(), ClientError>;
    async fn ban_user(&self, admin_id: &str, clerk_id: &str) -> Result<(), ClientError>;
}

/// Local state of a dashboard's ticket panel. Mutations change the list
/// only after the server call succeeds; failures leave it untouched and
/// record the error text.
#[derive(Debug, Clone, Default)]
pub struct TicketCenter {
    viewer: Option<User>,
    tickets: Vec<Ticket>,
    error: Option<String>,
}

impl TicketCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewer(&self) -> Option<&User> {
        self.viewer.as_ref()
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_admin(&self) -> bool {
        self.viewer.as_ref().is_some_and(|u| u.has_role(Role::Admin))
    }

    fn fail(&mut self, err: ClientError) {
        self.error = Some(err.to_string());
    }

    fn admin_id(&self) -> Result<String, ClientError> {
        match &self.viewer {
            Some(user) if user.has_role(Role::Admin) => Ok(user.clerk_id.clone()),
            Some(_) => Err(ClientError::Unauthorized("admin role required".into())),
            None => Err(ClientError::MissingConfig("dashboard not loaded".into())),
        }
    }

    /// Admins see the pending queue, everyone else their own tickets.
    pub async fn load(&mut self, api: &dyn TicketApi, clerk_id: &str) {
        self.error = None;
        let user = match api.get_user(clerk_id).await {
            Ok(user) => user,
            Err(e) => return self.fail(e),
        };
        let tickets = if user.has_role(Role::Admin) {
            api.pending_tickets().await
        } else {
            api.user_tickets(&user.clerk_id).await
        };
        self.viewer = Some(user);
        match tickets {
            Ok(list) => self.tickets = list,
            Err(e) => self.fail(e),
        }
    }

    pub async fn create_ticket(&mut self, api: &dyn TicketApi, draft: TicketDraft) {
        self.error = None;
        match api.create_ticket(&draft).await {
            Ok(ticket) => self.tickets.push(ticket),
            Err(e) => self.fail(e),
        }
    }

    /// Marks a listed ticket resolved. A ticket no longer in the list is
    /// left alone; the server would reject the repeat anyway.
    pub async fn resolve(&mut self, api: &dyn TicketApi, ticket_id: i32) {
        self.error = None;
        if !self.tickets.iter().any(|t| t.id == ticket_id) {
            return;
        }
        let admin_id = match self.admin_id() {
            Ok(id) => id,
            Err(e) => return self.fail(e),
        };
        match api
            .update_ticket_status(&admin_id, ticket_id, TicketStatus::Resolved)
            .await
        {
            Ok(()) => self.tickets.retain(|t| t.id != ticket_id),
            Err(e) => self.fail(e),
        }
    }

    /// Bans the user and drops every ticket they created from the list.
    pub async fn ban(&mut self, api: &dyn TicketApi, clerk_id: &str) {
        self.error = None;
        let admin_id = match self.admin_id() {
            Ok(id) => id,
            Err(e) => return self.fail(e),
        };
        match api.ban_user(&admin_id, clerk_id).await {
            Ok(()) => self.tickets.retain(|t| t.created_by != clerk_id),
            Err(e) => self.fail(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::enums::Urgency;
    use chrono::Utc;
    use std::sync::Mutex;

    fn user(clerk_id: &str, role: Role) -> User {
        User {
            clerk_id: clerk_id.into(),
            email: format!("{clerk_id}@example.com"),
            first_name: "Test".into(),
            last_name: "User".into(),
            role: Some(role),
            is_banned: false,
            created_at: Utc::now(),
        }
    }

    fn ticket(id: i32, created_by: &str) -> Ticket {
        Ticket {
            id,
            title: format!("Ticket {id}"),
            description: "details".into(),
            status: TicketStatus::Pending,
            urgency: Urgency::Medium,
            created_by: created_by.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[derive(Default)]
    struct FakeApi {
        viewer: Option<User>,
        pending: Vec<Ticket>,
        own: Vec<Ticket>,
        fail_writes: bool,
        resolved: Mutex<Vec<i32>>,
    }

    #[async_trait]
    impl TicketApi for FakeApi {
        async fn get_user(&self, clerk_id: &str) -> Result<User, ClientError> {
            self.viewer.clone().ok_or_else(|| ClientError::Status {
                status: 404,
                message: format!("User with clerkId {clerk_id} not found"),
            })
        }

        async fn user_tickets(&self, _clerk_id: &str) -> Result<Vec<Ticket>, ClientError> {
            Ok(self.own.clone())
        }

        async fn pending_tickets(&self) -> Result<Vec<Ticket>, ClientError> {
            Ok(self.pending.clone())
        }

        async fn create_ticket(&self, draft: &TicketDraft) -> Result<Ticket, ClientError> {
            if self.fail_writes {
                return Err(ClientError::Network("connection refused".into()));
            }
            let mut created = ticket(99, &draft.created_by);
            created.title = draft.title.clone();
            created.description = draft.description.clone();
            created.urgency = draft
                .urgency
                .as_deref()
                .and_then(|u| u.parse().ok())
                .unwrap_or_default();
            Ok(created)
        }

        async fn update_ticket_status(
            &self,
            _admin_id: &str,
            ticket_id: i32,
            _status: TicketStatus,
        ) -> Result<(), ClientError> {
            let mut resolved = self.resolved.lock().unwrap();
            if resolved.contains(&ticket_id) {
                return Err(ClientError::Status {
                    status: 409,
                    message: format!("Ticket {ticket_id} is already resolved"),
                });
            }
            resolved.push(ticket_id);
            Ok(())
        }

        async fn ban_user(&self, _admin_id: &str, _clerk_id: &str) -> Result<(), ClientError> {
            if self.fail_writes {
                return Err(ClientError::Network("timeout".into()));
            }
            Ok(())
        }
    }

    fn draft() -> TicketDraft {
        TicketDraft {
            title: "Login broken".into(),
            description: "Cannot sign in".into(),
            urgency: Some("high".into()),
            created_by: "user_7".into(),
        }
    }

    #[tokio::test]
    async fn test_admin_loads_pending_queue() {
        let api = FakeApi {
            viewer: Some(user("admin_1", Role::Admin)),
            pending: vec![ticket(1, "user_42"), ticket(2, "user_7")],
            own: vec![ticket(3, "admin_1")],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "admin_1").await;
        assert!(center.is_admin());
        assert_eq!(center.tickets().len(), 2);
        assert_eq!(center.error(), None);
    }

    #[tokio::test]
    async fn test_non_admin_loads_own_tickets() {
        let api = FakeApi {
            viewer: Some(user("user_7", Role::Employer)),
            pending: vec![ticket(1, "user_42")],
            own: vec![ticket(3, "user_7")],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "user_7").await;
        assert_eq!(center.tickets()[0].id, 3);
    }

    #[tokio::test]
    async fn test_unknown_user_sets_error() {
        let mut center = TicketCenter::new();
        center.load(&FakeApi::default(), "ghost").await;
        assert!(center.error().unwrap().contains("ghost"));
        assert!(center.tickets().is_empty());
    }

    #[tokio::test]
    async fn test_create_appends_exactly_one_ticket() {
        let api = FakeApi {
            viewer: Some(user("user_7", Role::Freelancer)),
            own: vec![ticket(3, "user_7")],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "user_7").await;
        center.create_ticket(&api, draft()).await;

        assert_eq!(center.tickets().len(), 2);
        let created = center.tickets().last().unwrap();
        assert_eq!(created.title, "Login broken");
        assert_eq!(created.status, TicketStatus::Pending);
        assert_eq!(created.urgency, Urgency::High);
    }

    #[tokio::test]
    async fn test_failed_create_leaves_list_unchanged() {
        let api = FakeApi {
            viewer: Some(user("user_7", Role::Freelancer)),
            own: vec![ticket(3, "user_7")],
            fail_writes: true,
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "user_7").await;
        center.create_ticket(&api, draft()).await;

        assert_eq!(center.tickets().len(), 1);
        assert!(center.error().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_resolve_removes_once() {
        let api = FakeApi {
            viewer: Some(user("admin_1", Role::Admin)),
            pending: vec![ticket(1, "user_42"), ticket(2, "user_7")],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "admin_1").await;

        center.resolve(&api, 1).await;
        assert_eq!(center.tickets().len(), 1);
        center.resolve(&api, 1).await;
        assert_eq!(center.tickets().len(), 1);
        assert_eq!(center.error(), None);
        assert_eq!(*api.resolved.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_ban_removes_every_ticket_of_user() {
        let api = FakeApi {
            viewer: Some(user("admin_1", Role::Admin)),
            pending: vec![
                ticket(1, "user_42"),
                ticket(2, "user_7"),
                ticket(3, "user_42"),
            ],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "admin_1").await;
        center.ban(&api, "user_42").await;

        assert_eq!(center.tickets().len(), 1);
        assert!(center.tickets().iter().all(|t| t.created_by != "user_42"));
    }

    #[tokio::test]
    async fn test_non_admin_cannot_ban() {
        let api = FakeApi {
            viewer: Some(user("user_7", Role::Employer)),
            own: vec![ticket(3, "user_7")],
            ..Default::default()
        };
        let mut center = TicketCenter::new();
        center.load(&api, "user_7").await;
        center.ban(&api, "user_7").await;
        assert_eq!(center.tickets().len(), 1);
        assert!(center.error().unwrap().contains("admin role required"));
    }
}
