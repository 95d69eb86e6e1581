//! Outbound user notifications.
//!
//! Delivery is best effort: a failed send is logged and never fails the
//! request that triggered it. The default transport simulates SMS by
//! writing the message to the log.

use async_trait::async_trait;
use log::{info, warn};
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notifications are disabled")]
    Disabled,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TicketCreated { ticket_id: i32, title: String },
    NewGigRequest { freelancer_name: String, gig_title: String },
    RequestAccepted { gig_title: String, employer_name: String },
    RequestRejected { gig_title: String, employer_name: String },
    MilestoneSubmitted { freelancer_name: String, gig_title: String, milestone_number: usize },
    MilestoneApproved { gig_title: String, milestone_number: usize, payment_amount: f64 },
    MilestoneRejected { gig_title: String },
    FreelancerGigCompleted { gig_title: String, total_payment: f64 },
    EmployerGigCompleted { gig_title: String, freelancer_name: String },
}

impl Notification {
    pub fn message(&self) -> String {
        match self {
            Self::TicketCreated { ticket_id, title } => {
                format!("New Ticket Created!\nID: {ticket_id}\nTitle: {title}")
            }
            Self::NewGigRequest { freelancer_name, gig_title } => {
                format!("New gig request! {freelancer_name} has applied for your gig: '{gig_title}'")
            }
            Self::RequestAccepted { gig_title, employer_name } => format!(
                "Good news! {employer_name} has accepted your application for '{gig_title}'. The gig is now active."
            ),
            Self::RequestRejected { gig_title, employer_name } => format!(
                "Your application for '{gig_title}' by {employer_name} was not accepted at this time."
            ),
            Self::MilestoneSubmitted { freelancer_name, gig_title, milestone_number } => format!(
                "{freelancer_name} has submitted milestone #{milestone_number} for '{gig_title}'. Please review it."
            ),
            Self::MilestoneApproved { gig_title, milestone_number, payment_amount } => format!(
                "Milestone #{milestone_number} for '{gig_title}' has been approved! ${payment_amount:.2} has been added to your balance."
            ),
            Self::MilestoneRejected { gig_title } => format!(
                "Unfortunately, your milestone submission for '{gig_title}' was rejected and the gig has been terminated."
            ),
            Self::FreelancerGigCompleted { gig_title, total_payment } => format!(
                "Congratulations! Your gig '{gig_title}' is now complete. You earned a total of ${total_payment:.2}."
            ),
            Self::EmployerGigCompleted { gig_title, freelancer_name } => {
                format!("The gig '{gig_title}' with {freelancer_name} has been successfully completed!")
            }
        }
    }
}

/// Logs each message in place of an SMS gateway.
#[derive(Debug, Clone)]
pub struct SmsLogNotifier {
    enabled: bool,
}

impl SmsLogNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl Notifier for SmsLogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        if !self.enabled {
            return Err(NotifyError::Disabled);
        }
        info!("[SMS] TO: {recipient} | MESSAGE: {message}");
        Ok(())
    }
}

/// Keeps every sent message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        sent.push((recipient.to_string(), message.to_string()));
        Ok(())
    }
}

/// Sends to `recipient`, or to `fallback` when the user has no phone on file.
pub async fn deliver(
    notifier: &dyn Notifier,
    recipient: Option<&str>,
    fallback: Option<&str>,
    notification: &Notification,
) -> bool {
    let Some(to) = recipient.or(fallback) else {
        info!("No recipient for notification, skipping: {notification:?}");
        return false;
    };
    match notifier.send(to, &notification.message()).await {
        Ok(()) => true,
        Err(NotifyError::Disabled) => false,
        Err(e) => {
            warn!("Failed to deliver notification to {to}: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_templates() {
        let note = Notification::NewGigRequest {
            freelancer_name: "Ana Silva".into(),
            gig_title: "Landing page".into(),
        };
        assert_eq!(
            note.message(),
            "New gig request! Ana Silva has applied for your gig: 'Landing page'"
        );

        let note = Notification::MilestoneApproved {
            gig_title: "Landing page".into(),
            milestone_number: 2,
            payment_amount: 150.0,
        };
        assert!(note.message().contains("Milestone #2"));
        assert!(note.message().contains("$150.00"));
    }

    #[tokio::test]
    async fn test_deliver_prefers_recipient_then_fallback() {
        let notifier = RecordingNotifier::default();
        let note = Notification::MilestoneRejected { gig_title: "Logo".into() };

        assert!(deliver(&notifier, Some("+1555"), Some("+1999"), &note).await);
        assert!(deliver(&notifier, None, Some("+1999"), &note).await);
        assert!(!deliver(&notifier, None, None, &note).await);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "+1555");
        assert_eq!(sent[1].0, "+1999");
    }

    #[tokio::test]
    async fn test_disabled_notifier_skips() {
        let notifier = SmsLogNotifier::new(false);
        let note = Notification::TicketCreated { ticket_id: 1, title: "Help".into() };
        assert!(!deliver(&notifier, Some("+1555"), None, &note).await);
    }
}
