use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::HaConfig;
use crate::engine::{EntityState, HubClient, HubError, StateSnapshot};
use crate::notify::Notification;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Home Assistant REST API client.
///
/// Authenticates with a long-lived access token and covers the two calls
/// battwatch needs: reading all entity states and calling a notify service.
pub struct HaClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HaClient {
    pub fn new(config: &HaConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self {
        HubError::Transport(e.to_string())
    }
}

/// One entry of the hub's `GET /api/states` response.
#[derive(Debug, Deserialize)]
struct StateDoc {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: serde_json::Value,
}

fn attr(attributes: &serde_json::Value, key: &str) -> Option<String> {
    attributes.get(key).and_then(|v| v.as_str()).map(String::from)
}

impl From<StateDoc> for EntityState {
    fn from(doc: StateDoc) -> Self {
        Self {
            friendly_name: attr(&doc.attributes, "friendly_name"),
            device_class: attr(&doc.attributes, "device_class"),
            unit_of_measurement: attr(&doc.attributes, "unit_of_measurement"),
            entity_id: doc.entity_id,
            state: doc.state,
        }
    }
}

#[async_trait]
impl HubClient for HaClient {
    async fn states(&self) -> Result<StateSnapshot, HubError> {
        let docs: Vec<StateDoc> = self
            .http
            .get(format!("{}/api/states", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(entities = docs.len(), "fetched entity states");

        Ok(StateSnapshot::new(
            docs.into_iter().map(EntityState::from).collect(),
        ))
    }

    async fn notify(&self, target: &str, notification: &Notification) -> Result<(), HubError> {
        let body = serde_json::json!({
            "title": notification.title,
            "message": notification.message,
            "data": { "actions": notification.actions },
        });

        self.http
            .post(format!("{}/api/services/notify/{}", self.base_url, target))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_doc_conversion() {
        let doc: StateDoc = serde_json::from_str(
            r#"{
                "entity_id": "sensor.motion_battery_level",
                "state": "15",
                "attributes": {
                    "friendly_name": "Motion Sensor",
                    "device_class": "battery",
                    "unit_of_measurement": "%"
                }
            }"#,
        )
        .unwrap();

        let entity = EntityState::from(doc);
        assert_eq!(entity.entity_id, "sensor.motion_battery_level");
        assert_eq!(entity.state, "15");
        assert_eq!(entity.friendly_name.as_deref(), Some("Motion Sensor"));
        assert_eq!(entity.device_class.as_deref(), Some("battery"));
        assert_eq!(entity.unit_of_measurement.as_deref(), Some("%"));
    }

    #[test]
    fn test_state_doc_without_attributes() {
        let doc: StateDoc =
            serde_json::from_str(r#"{"entity_id": "sensor.x", "state": "on"}"#).unwrap();

        let entity = EntityState::from(doc);
        assert_eq!(entity.friendly_name, None);
        assert_eq!(entity.device_class, None);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = HaClient::new(&HaConfig {
            enabled: true,
            url: "http://hub.local:8123/".to_string(),
            token: "secret".to_string(),
        })
        .unwrap();

        assert_eq!(client.base_url, "http://hub.local:8123");
    }
}
