//! MQTT dismissal-action bridge.
//!
//! battwatch's notifications carry a dismiss action button. The hub relays
//! `mobile_app_notification_action` events to an MQTT topic (a one-line hub
//! automation); this module subscribes to that topic and feeds parsed
//! actions back into the runtime. battwatch never publishes anything.

mod actions;
mod client;

pub use actions::parse_action;
pub use client::{MqttClient, MqttError, MqttMessage, RumqttcClient};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::ActionEvent;

/// Listens on the action topic and forwards parsed actions to the runtime.
pub struct ActionBridge<C: MqttClient> {
    client: C,
    topic: String,
}

impl<C: MqttClient> ActionBridge<C> {
    pub fn new(client: C, topic: String) -> Self {
        Self { client, topic }
    }

    /// Connect, subscribe, and pump actions into `tx` until the client stops.
    ///
    /// Intended to be `tokio::spawn`-ed; connection problems are logged and
    /// end the bridge rather than the process.
    pub async fn run(mut self, tx: mpsc::Sender<ActionEvent>) {
        if let Err(e) = self.client.connect().await {
            warn!("action bridge failed to connect: {}", e);
            return;
        }

        if let Err(e) = self.client.subscribe(&self.topic).await {
            warn!(topic = %self.topic, "action bridge failed to subscribe: {}", e);
            return;
        }

        info!(topic = %self.topic, "listening for notification actions");

        while let Some(msg) = self.client.poll_message().await {
            match parse_action(&msg.payload) {
                Some(event) => {
                    // Receiver dropped means the runtime is shutting down
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                None => {
                    debug!(topic = %msg.topic, "ignoring unrecognized action payload");
                }
            }
        }

        info!("action bridge stopped");
    }
}
