//! Notification boundary.
//!
//! The engine decides *whether* a notification is warranted and *what
//! facts* it must contain; rendering and delivery belong to an external
//! collaborator. Dispatch is fire-and-forget: a delivery failure is logged
//! and never fails the request that triggered it.

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

/// Facts handed to the collaborator after a successful grant. The setup
/// token is an opaque handle minted at the boundary; the engine does not
/// generate credential-recovery links itself.
#[derive(Debug, Clone, Serialize)]
pub struct AccessNotification {
    pub recipient: String,
    pub course_title: String,
    pub newly_provisioned: bool,
    pub setup_token: Uuid,
}

impl AccessNotification {
    pub fn new(recipient: String, course_title: String, newly_provisioned: bool) -> Self {
        Self {
            recipient,
            course_title,
            newly_provisioned,
            setup_token: Uuid::new_v4(),
        }
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: AccessNotification);
}

/// Posts the notification to a configured webhook.
pub struct WebhookDispatcher {
    url: String,
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn dispatch(&self, notification: AccessNotification) {
        let recipient = notification.recipient.clone();
        match self.client.post(&self.url).json(&notification).send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("access notification dispatched to {recipient}");
            }
            Ok(response) => {
                log::error!(
                    "access notification for {recipient} rejected: {}",
                    response.status()
                );
            }
            Err(e) => {
                log::error!("access notification for {recipient} failed: {e}");
            }
        }
    }
}

/// Logs the would-be notification when no webhook is configured.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: AccessNotification) {
        log::info!(
            "[mock notification] to={} course={:?} newly_provisioned={}",
            notification.recipient,
            notification.course_title,
            notification.newly_provisioned
        );
    }
}

/// Records dispatched notifications; test support, like
/// [`crate::auth::StaticVerifier`].
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: std::sync::Mutex<Vec<AccessNotification>>,
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn dispatch(&self, notification: AccessNotification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}
