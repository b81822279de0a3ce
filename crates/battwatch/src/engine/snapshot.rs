/// State of a single hub entity at the time the snapshot was taken.
///
/// Only the handful of attributes the battery check cares about are kept;
/// everything else in the hub's state document is dropped at conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityState {
    /// Entity ID (e.g. "sensor.motion_battery_level")
    pub entity_id: String,

    /// Raw state value (e.g. "15", "15%", "on", "unavailable")
    pub state: String,

    /// Human-readable name, if the hub provides one
    pub friendly_name: Option<String>,

    /// Device class attribute (e.g. "battery")
    pub device_class: Option<String>,

    /// Unit of measurement attribute (e.g. "%")
    pub unit_of_measurement: Option<String>,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            ..Self::default()
        }
    }

    pub fn with_friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    /// Friendly name, falling back to the entity ID
    pub fn display_name(&self) -> &str {
        self.friendly_name.as_deref().unwrap_or(&self.entity_id)
    }

    /// Entity domain, the part of the ID before the first '.'
    pub fn domain(&self) -> &str {
        self.entity_id.split('.').next().unwrap_or("")
    }
}

/// Presence reported by a device tracker entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Home,
    Away,
    /// Tracker missing from the snapshot, or in a state we don't recognize
    Unknown,
}

/// Read-only view of the hub's entity states for one evaluation cycle.
///
/// Entities keep the order the hub returned them in; reports preserve it.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    entities: Vec<EntityState>,
}

impl StateSnapshot {
    pub fn new(entities: Vec<EntityState>) -> Self {
        Self { entities }
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.iter()
    }

    pub fn get(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.iter().find(|e| e.entity_id == entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up a device tracker entity and map its state to a presence.
    pub fn presence(&self, tracker_id: &str) -> Presence {
        match self.get(tracker_id).map(|e| e.state.as_str()) {
            Some("home") => Presence::Home,
            Some("not_home") | Some("away") => Presence::Away,
            _ => Presence::Unknown,
        }
    }
}
