//! Typed consumer of the HTTP API: request helpers plus the view state
//! the dashboards, chat and gig browser keep between calls.

pub mod api;
pub mod chat;
pub mod dashboard;
pub mod error;
pub mod gigs;
pub mod realtime;
pub mod session;

pub use api::{ClientConfig, WorklyClient};
pub use chat::{ChatApi, ChatFeed};
pub use dashboard::{TicketApi, TicketCenter, TicketDraft};
pub use error::ClientError;
pub use gigs::{GigApi, GigBrowser, GigFilter};
pub use realtime::{ChatSubscription, SseEvent, SseParser};
pub use session::SessionContext;
