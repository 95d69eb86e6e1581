//! Freelance marketplace backend: role-gated dashboards, support tickets
//! with realtime chat, gig postings and milestone escrow.

pub mod billing;
pub mod chat;
pub mod client;
pub mod core;
pub mod gigs;
pub mod main_module;
pub mod notify;
pub mod profiles;
pub mod realtime;
pub mod reviews;
pub mod security;
pub mod tickets;
pub mod users;

pub use crate::core::config::AppConfig;
pub use crate::core::shared::state::AppState;
