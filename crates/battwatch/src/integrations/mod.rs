//! Hub integrations.
//!
//! Each integration fills one collaborator seam: `ha` implements the
//! [`HubClient`](crate::engine::HubClient) trait over the Home Assistant
//! REST API, `mqtt` feeds dismissal actions back into the runtime.

#[cfg(feature = "integration_ha")]
pub mod ha;

#[cfg(feature = "integration_mqtt")]
pub mod mqtt;
