use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::notify::{deliver, Notification, Notifier, SmsLogNotifier};
use crate::realtime::ChannelHub;
use crate::security::session::SessionKeys;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub channels: ChannelHub,
    pub notifier: Arc<dyn Notifier>,
    pub session_keys: SessionKeys,
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        let notifier: Arc<dyn Notifier> =
            Arc::new(SmsLogNotifier::new(config.notifications.enabled));
        Self::with_notifier(conn, config, notifier)
    }

    pub fn with_notifier(conn: DbPool, config: AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            channels: ChannelHub::new(config.realtime.channel_capacity),
            session_keys: SessionKeys::new(&config.auth),
            conn,
            config,
            notifier,
        }
    }

    pub async fn notify(&self, phone: Option<&str>, notification: Notification) {
        deliver(
            self.notifier.as_ref(),
            phone,
            self.config.notifications.default_recipient.as_deref(),
            &notification,
        )
        .await;
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}
