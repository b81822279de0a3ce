use async_trait::async_trait;
use thiserror::Error;

use crate::notify::Notification;

use super::snapshot::StateSnapshot;

/// Errors surfaced by a hub client.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("hub transport error: {0}")]
    Transport(String),
}

/// The hub collaborator the runtime talks to.
///
/// One implementation per hub flavor; the evaluation core only ever sees
/// this trait, which keeps it testable with an in-memory fake.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Fetch the current state of every entity the hub knows about.
    async fn states(&self) -> Result<StateSnapshot, HubError>;

    /// Deliver a notification through the hub's notify service.
    async fn notify(&self, target: &str, notification: &Notification) -> Result<(), HubError>;
}

/// User-initiated actions arriving from outside the check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionEvent {
    /// The person pressed the "dismiss" button on a notification.
    Dismiss { person: String },
}
