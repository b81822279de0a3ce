use std::fmt;

use strum::Display;
use tracing::debug;

use crate::config::MonitorConfig;

use super::snapshot::{EntityState, StateSnapshot};

/// Battery condition of a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    Low,
    Normal,
}

/// What a battery-related entity looks like, decided purely from its ID and
/// device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Percentage battery sensor ("sensor." domain)
    BatteryLevel,
    /// Binary low-battery indicator ("binary_sensor." domain); `critical`
    /// when the ID marks an is-low sensor
    LowBatteryIndicator { critical: bool },
    Unrelated,
}

/// ID substrings that mark an entity as battery-related.
const BATTERY_TERMS: &[&str] = &["battery", "batt", "islow", "low_battery"];

/// ID substrings that disqualify a sensor from percentage classification
/// (charging status and power sensors share battery-ish names).
const SKIP_TERMS: &[&str] = &["charging_status", "recharge", "power"];

type RulePredicate = fn(&str, Option<&str>) -> bool;

/// Ordered classification rules, evaluated top to bottom; the first match
/// wins. Binary rules come before the skip rule so that an indicator like
/// "binary_sensor.plug_power_battery_islow" is still recognized.
const RULES: &[(RulePredicate, EntityKind)] = &[
    (is_islow_binary, EntityKind::LowBatteryIndicator { critical: true }),
    (is_battery_binary, EntityKind::LowBatteryIndicator { critical: false }),
    (has_skip_term, EntityKind::Unrelated),
    (is_battery_level, EntityKind::BatteryLevel),
];

fn is_islow_binary(id: &str, _device_class: Option<&str>) -> bool {
    id.starts_with("binary_sensor.") && id.contains("islow")
}

fn is_battery_binary(id: &str, _device_class: Option<&str>) -> bool {
    id.starts_with("binary_sensor.") && BATTERY_TERMS.iter().any(|term| id.contains(term))
}

fn has_skip_term(id: &str, _device_class: Option<&str>) -> bool {
    SKIP_TERMS.iter().any(|term| id.contains(term))
}

fn is_battery_level(id: &str, device_class: Option<&str>) -> bool {
    id.starts_with("sensor.") && (device_class == Some("battery") || id.contains("batt"))
}

/// Classify an entity by its ID pattern (and device class attribute).
pub fn entity_kind(entity: &EntityState) -> EntityKind {
    let id = entity.entity_id.to_lowercase();
    let device_class = entity.device_class.as_deref();

    for (matches, kind) in RULES {
        if matches(&id, device_class) {
            return *kind;
        }
    }

    EntityKind::Unrelated
}

/// Severity of a percentage battery level under the configured thresholds.
pub fn severity_for_level(level: f64, monitor: &MonitorConfig) -> Severity {
    if level <= f64::from(monitor.critical_battery_threshold) {
        Severity::Critical
    } else if level <= f64::from(monitor.low_battery_threshold) {
        Severity::Low
    } else {
        Severity::Normal
    }
}

/// Parse a percentage state value, stripping a trailing '%' if present.
///
/// Returns None for the hub's "unavailable"/"unknown" placeholders and for
/// anything that isn't a number.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "unavailable" || trimmed == "unknown" {
        return None;
    }
    trimmed.trim_end_matches('%').trim_end().parse().ok()
}

/// The reading shown for a reported entity: a percentage for level sensors,
/// a severity label for binary indicators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Percent(f64),
    Indicator(Severity),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Percent(p) if p.fract() == 0.0 => write!(f, "{:.0}%", p),
            Reading::Percent(p) => write!(f, "{}%", p),
            Reading::Indicator(severity) => write!(f, "{}", severity),
        }
    }
}

/// One reported entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportEntry {
    pub name: String,
    pub reading: Reading,
}

/// Classified low-battery report for one evaluation cycle.
///
/// Entries keep snapshot (discovery) order. An entity ID on the exclusion
/// list never appears here, whatever its state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatteryReport {
    pub critical: Vec<ReportEntry>,
    pub low: Vec<ReportEntry>,
}

impl BatteryReport {
    pub fn is_empty(&self) -> bool {
        self.critical.is_empty() && self.low.is_empty()
    }
}

/// Scan a snapshot and build the battery report.
pub fn build_report(snapshot: &StateSnapshot, monitor: &MonitorConfig) -> BatteryReport {
    let mut report = BatteryReport::default();

    for entity in snapshot.iter() {
        if monitor.exclude.contains(&entity.entity_id) {
            debug!(entity_id = %entity.entity_id, "skipping excluded entity");
            continue;
        }

        match entity_kind(entity) {
            EntityKind::BatteryLevel => {
                let Some(level) = parse_percentage(&entity.state) else {
                    debug!(
                        entity_id = %entity.entity_id,
                        state = %entity.state,
                        "could not parse battery level"
                    );
                    continue;
                };

                debug!(entity_id = %entity.entity_id, level, "battery level sensor");

                let entry = ReportEntry {
                    name: entity.display_name().to_string(),
                    reading: Reading::Percent(level),
                };
                match severity_for_level(level, monitor) {
                    Severity::Critical => report.critical.push(entry),
                    Severity::Low => report.low.push(entry),
                    Severity::Normal => {}
                }
            }
            EntityKind::LowBatteryIndicator { critical } => {
                if entity.state != "on" {
                    continue;
                }

                let severity = if critical { Severity::Critical } else { Severity::Low };
                debug!(
                    entity_id = %entity.entity_id,
                    %severity,
                    "low battery indicator active"
                );

                let entry = ReportEntry {
                    name: entity.display_name().to_string(),
                    reading: Reading::Indicator(severity),
                };
                match severity {
                    Severity::Critical => report.critical.push(entry),
                    _ => report.low.push(entry),
                }
            }
            EntityKind::Unrelated => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> MonitorConfig {
        MonitorConfig::default()
    }

    #[test]
    fn test_entity_kind_rules() {
        let kind = |id: &str| entity_kind(&EntityState::new(id, "0"));

        assert_eq!(
            kind("binary_sensor.camera_islow"),
            EntityKind::LowBatteryIndicator { critical: true }
        );
        assert_eq!(
            kind("binary_sensor.door_low_battery"),
            EntityKind::LowBatteryIndicator { critical: false }
        );
        assert_eq!(kind("sensor.motion_battery_level"), EntityKind::BatteryLevel);
        assert_eq!(kind("sensor.lamp_brightness"), EntityKind::Unrelated);
        // Binary rules outrank the skip-term rule
        assert_eq!(
            kind("binary_sensor.plug_power_battery_islow"),
            EntityKind::LowBatteryIndicator { critical: true }
        );
        // Skip terms disqualify percentage classification
        assert_eq!(kind("sensor.phone_battery_charging_status"), EntityKind::Unrelated);
        assert_eq!(kind("sensor.ups_battery_power"), EntityKind::Unrelated);
        // Battery domain entities outside sensor/binary_sensor are unrelated
        assert_eq!(kind("switch.battery_charger"), EntityKind::Unrelated);
    }

    #[test]
    fn test_entity_kind_uses_device_class() {
        let entity = EntityState::new("sensor.upstairs_motion", "42").with_device_class("battery");
        assert_eq!(entity_kind(&entity), EntityKind::BatteryLevel);
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_percentage("15"), Some(15.0));
        assert_eq!(parse_percentage("15%"), Some(15.0));
        assert_eq!(parse_percentage(" 7.5% "), Some(7.5));
        assert_eq!(parse_percentage("unavailable"), None);
        assert_eq!(parse_percentage("unknown"), None);
        assert_eq!(parse_percentage("charging"), None);
        assert_eq!(parse_percentage(""), None);
    }

    #[test]
    fn test_severity_for_level() {
        // Defaults: critical = 10, low = 20
        let cfg = monitor();
        assert_eq!(severity_for_level(3.0, &cfg), Severity::Critical);
        assert_eq!(severity_for_level(10.0, &cfg), Severity::Critical);
        assert_eq!(severity_for_level(10.5, &cfg), Severity::Low);
        assert_eq!(severity_for_level(20.0, &cfg), Severity::Low);
        assert_eq!(severity_for_level(20.5, &cfg), Severity::Normal);
        assert_eq!(severity_for_level(100.0, &cfg), Severity::Normal);
    }

    #[test]
    fn test_threshold_boundaries() {
        // Defaults: critical = 10, low = 20
        let snapshot = StateSnapshot::new(vec![
            EntityState::new("sensor.a_battery", "10"),
            EntityState::new("sensor.b_battery", "11"),
            EntityState::new("sensor.c_battery", "20"),
            EntityState::new("sensor.d_battery", "21"),
        ]);

        let report = build_report(&snapshot, &monitor());

        assert_eq!(report.critical.len(), 1);
        assert_eq!(report.critical[0].name, "sensor.a_battery");
        assert_eq!(report.low.len(), 2);
        assert_eq!(report.low[0].name, "sensor.b_battery");
        assert_eq!(report.low[1].name, "sensor.c_battery");
    }

    #[test]
    fn test_islow_indicator_is_critical_independent_of_thresholds() {
        let mut cfg = monitor();
        cfg.low_battery_threshold = 0;
        cfg.critical_battery_threshold = 0;

        let snapshot = StateSnapshot::new(vec![EntityState::new(
            "binary_sensor.camera_islow",
            "on",
        )]);

        let report = build_report(&snapshot, &cfg);
        assert_eq!(report.critical.len(), 1);
        assert_eq!(report.critical[0].reading, Reading::Indicator(Severity::Critical));
    }

    #[test]
    fn test_inactive_indicator_not_reported() {
        let snapshot = StateSnapshot::new(vec![
            EntityState::new("binary_sensor.camera_islow", "off"),
            EntityState::new("binary_sensor.door_battery", "unavailable"),
        ]);

        assert!(build_report(&snapshot, &monitor()).is_empty());
    }

    #[test]
    fn test_excluded_entities_never_reported() {
        let mut cfg = monitor();
        cfg.exclude.insert("sensor.old_phone_battery".to_string());
        cfg.exclude.insert("binary_sensor.camera_islow".to_string());

        let snapshot = StateSnapshot::new(vec![
            EntityState::new("sensor.old_phone_battery", "1"),
            EntityState::new("binary_sensor.camera_islow", "on"),
            EntityState::new("sensor.kept_battery", "5"),
        ]);

        let report = build_report(&snapshot, &cfg);
        assert_eq!(report.critical.len(), 1);
        assert_eq!(report.critical[0].name, "sensor.kept_battery");
        assert!(report.low.is_empty());
    }

    #[test]
    fn test_unparseable_levels_are_skipped() {
        let snapshot = StateSnapshot::new(vec![
            EntityState::new("sensor.broken_battery", "n/a"),
            EntityState::new("sensor.ok_battery", "15"),
        ]);

        let report = build_report(&snapshot, &monitor());
        assert!(report.critical.is_empty());
        assert_eq!(report.low.len(), 1);
        assert_eq!(report.low[0].name, "sensor.ok_battery");
    }

    #[test]
    fn test_friendly_names_and_readings() {
        let snapshot = StateSnapshot::new(vec![
            EntityState::new("sensor.motion_battery_level", "5%")
                .with_friendly_name("Motion Sensor"),
            EntityState::new("binary_sensor.camera_islow", "on").with_friendly_name("Camera"),
        ]);

        let report = build_report(&snapshot, &monitor());

        let rendered: Vec<String> = report
            .critical
            .iter()
            .map(|e| format!("{}: {}", e.name, e.reading))
            .collect();
        assert_eq!(rendered, vec!["Motion Sensor: 5%", "Camera: CRITICAL"]);
        assert!(report.low.is_empty());
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(Reading::Percent(5.0).to_string(), "5%");
        assert_eq!(Reading::Percent(7.5).to_string(), "7.5%");
        assert_eq!(Reading::Indicator(Severity::Critical).to_string(), "CRITICAL");
        assert_eq!(Reading::Indicator(Severity::Low).to_string(), "LOW");
    }
}
