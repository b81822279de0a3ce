//! Notification payloads and the consolidated message builder.

mod message;

pub use message::compose;

use serde::Serialize;

/// Prefix for action identifiers battwatch emits and recognizes.
pub const ACTION_PREFIX: &str = "battwatch";

/// A push notification ready for the hub's notify service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

/// An action button attached to a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationAction {
    /// Action identifier sent back when the button is pressed,
    /// e.g. "battwatch.dismiss.anna"
    pub action: String,

    /// Button label shown to the user
    pub title: String,
}

/// The action identifier for dismissing a person's notifications.
pub fn dismiss_action(person: &str) -> String {
    format!("{}.dismiss.{}", ACTION_PREFIX, person)
}
