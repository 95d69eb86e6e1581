//! Server push for per-ticket chat channels.
//!
//! A channel is a named `broadcast` sender created by its first subscriber
//! and removed when the last one leaves. Events are delivered to every
//! subscriber connected at publish time; publishing to a channel with nobody
//! listening is not an error and creates nothing.

mod handlers;
mod hub;

pub use handlers::{configure_realtime_routes, handle_channel_sse, handle_channel_websocket};
pub use hub::{ChannelEvent, ChannelHub, Subscription, NEW_MESSAGE_EVENT};
