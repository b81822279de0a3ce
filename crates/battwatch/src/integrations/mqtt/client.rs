use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::MqttConfig;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// MQTT message received from a subscription
#[derive(Debug, Clone)]
pub struct MqttMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("MQTT client not connected, call connect() first")]
    NotConnected,

    #[error(transparent)]
    Client(#[from] rumqttc::ClientError),
}

/// Trait for MQTT client operations
///
/// This trait allows for mocking the MQTT client for testing purposes
#[async_trait]
pub trait MqttClient: Send + Sync {
    /// Connect to the MQTT broker
    async fn connect(&mut self) -> Result<(), MqttError>;

    /// Subscribe to an MQTT topic
    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;

    /// Poll for the next message from subscribed topics
    ///
    /// Returns None if no more messages will arrive and the client should stop
    async fn poll_message(&mut self) -> Option<MqttMessage>;
}

/// Mock MQTT client for testing
///
/// Subscriptions are behind a shared handle so tests can observe them after
/// the bridge has consumed the client.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockMqttClient {
    pub messages: Vec<MqttMessage>,
    pub subscriptions: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    pub is_connected: bool,
}

#[cfg(test)]
#[async_trait]
impl MqttClient for MockMqttClient {
    async fn connect(&mut self) -> Result<(), MqttError> {
        self.is_connected = true;
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        if let Ok(mut subscriptions) = self.subscriptions.lock() {
            subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        if self.messages.is_empty() {
            None
        } else {
            Some(self.messages.remove(0))
        }
    }
}

#[cfg(test)]
impl MockMqttClient {
    pub fn with_payloads(payloads: &[&str]) -> Self {
        Self {
            messages: payloads
                .iter()
                .map(|p| MqttMessage {
                    topic: "battwatch/action".to_string(),
                    payload: p.as_bytes().to_vec(),
                })
                .collect(),
            ..Self::default()
        }
    }
}

/// Real MQTT client implementation using rumqttc
pub struct RumqttcClient {
    /// MQTT connection options (stored for lazy initialization)
    mqtt_options: MqttOptions,

    /// AsyncClient (created in connect())
    client: Option<AsyncClient>,

    /// Message receiver (created in connect())
    message_rx: Option<mpsc::UnboundedReceiver<MqttMessage>>,

    /// Background event loop task handle
    event_loop_task: Option<JoinHandle<()>>,
}

impl RumqttcClient {
    /// Create a new RumqttcClient from configuration
    pub fn new(config: &MqttConfig) -> Self {
        let mut mqtt_options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        mqtt_options.set_keep_alive(KEEP_ALIVE);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        Self {
            mqtt_options,
            client: None,
            message_rx: None,
            event_loop_task: None,
        }
    }
}

#[async_trait]
impl MqttClient for RumqttcClient {
    async fn connect(&mut self) -> Result<(), MqttError> {
        let (client, mut event_loop) = AsyncClient::new(self.mqtt_options.clone(), 10);

        let (message_tx, message_rx) = mpsc::unbounded_channel();

        // Background task pumps the rumqttc event loop into the channel
        let task = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = MqttMessage {
                            topic: publish.topic.to_string(),
                            payload: publish.payload.to_vec(),
                        };

                        // Receiver dropped means the bridge is gone
                        if message_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Ok(_) => {
                        // Ignore other events (connack, suback, pings, ...)
                    }
                    Err(e) => {
                        warn!("MQTT event loop error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
            info!("MQTT event loop task exiting");
        });

        self.client = Some(client);
        self.message_rx = Some(message_rx);
        self.event_loop_task = Some(task);

        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        let client = self.client.as_ref().ok_or(MqttError::NotConnected)?;
        client.subscribe(topic, QoS::AtLeastOnce).await?;
        Ok(())
    }

    async fn poll_message(&mut self) -> Option<MqttMessage> {
        match &mut self.message_rx {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl Drop for RumqttcClient {
    fn drop(&mut self) {
        if let Some(task) = self.event_loop_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_client_connects_and_drains_messages() {
        let mut client = MockMqttClient::with_payloads(&["payload"]);
        assert!(!client.is_connected);

        client.connect().await.unwrap();
        assert!(client.is_connected);

        let msg = client.poll_message().await.unwrap();
        assert_eq!(msg.payload, b"payload");
        assert!(client.poll_message().await.is_none());
    }
}
