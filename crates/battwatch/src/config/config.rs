use std::collections::HashSet;
use std::path::PathBuf;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

use super::diagnostics::{format_diagnostics, Diagnostic, Error, SourceInfo, ValidationError, Warning};
use super::partial::{
    PartialConfig, PartialHaConfig, PartialIntegrationsConfig, PartialMonitorConfig,
    PartialMqttConfig,
};

/// Battery level at or below which a sensor is reported as Low.
pub const DEFAULT_LOW_THRESHOLD: u8 = 20;

/// Battery level at or below which a sensor is reported as Critical.
pub const DEFAULT_CRITICAL_THRESHOLD: u8 = 10;

const DEFAULT_CHECK_TIME: &str = "18:15:00";
const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Stockholm;
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_ACTION_TOPIC: &str = "battwatch/action";

#[derive(Debug, Default, Clone)]
pub struct Config {
    pub logging: LoggingConfig,
    pub monitor: MonitorConfig,
    pub persons: Vec<PersonConfig>,
    pub integrations: IntegrationsConfig,
}

// LogLevel needs Deserialize because it's used in PartialLoggingConfig with toml::Spanned
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Battery percentage at or below which a sensor is reported as Low
    pub low_battery_threshold: u8,

    /// Battery percentage at or below which a sensor is reported as Critical
    pub critical_battery_threshold: u8,

    /// Local wall-clock time of the daily check
    pub check_time: NaiveTime,

    /// Timezone the check time is interpreted in
    pub timezone: Tz,

    /// Entity IDs excluded from battery monitoring
    pub exclude: HashSet<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            low_battery_threshold: DEFAULT_LOW_THRESHOLD,
            critical_battery_threshold: DEFAULT_CRITICAL_THRESHOLD,
            check_time: default_check_time(),
            timezone: DEFAULT_TIMEZONE,
            exclude: HashSet::new(),
        }
    }
}

fn default_check_time() -> NaiveTime {
    NaiveTime::from_hms_opt(18, 15, 0).unwrap()
}

/// One person to notify about low batteries
#[derive(Debug, Clone)]
pub struct PersonConfig {
    /// Person identifier (the `[persons.<id>]` key)
    pub name: String,

    /// Notify service target, e.g. "mobile_app_pixel_7"
    pub notify: String,

    /// Optional device_tracker entity used to suppress notifications while away
    pub tracker: Option<String>,

    /// Minimum seconds between consecutive notifications to this person
    pub cooldown: u64,
}

#[derive(Debug, Default, Clone)]
pub struct IntegrationsConfig {
    pub ha: Option<HaConfig>,
    pub mqtt: Option<MqttConfig>,
}

/// Configuration for the Home Assistant REST integration
#[derive(Debug, Clone)]
pub struct HaConfig {
    /// Enable the HA integration (default: true when section is present)
    pub enabled: bool,

    /// Base URL of the hub, e.g. "http://homeassistant.local:8123"
    pub url: String,

    /// Long-lived access token
    pub token: String,
}

/// Configuration for the MQTT dismissal-action bridge
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// MQTT broker hostname or IP address
    pub broker: String,

    /// MQTT broker port
    pub port: u16,

    /// MQTT client ID
    pub client_id: String,

    /// Topic notification actions are forwarded to (default: "battwatch/action")
    pub action_topic: String,

    /// Optional username for authentication
    pub username: Option<String>,

    /// Optional password for authentication
    pub password: Option<String>,
}

impl Config {
    /// Load configuration from multiple TOML files with import resolution
    ///
    /// Supports multiple config files (e.g. base + secrets), import
    /// statements within config files, conflict detection across all
    /// sources, and validation with all errors and warnings reported
    /// together.
    ///
    /// Returns Ok((Config, diagnostics)) where diagnostics contains warnings.
    /// Only returns Err if there are actual errors (not just warnings).
    pub fn from_files(
        paths: &[PathBuf],
    ) -> Result<(Self, Vec<Diagnostic>), Box<dyn std::error::Error>> {
        let configs = PartialConfig::load_with_imports(paths)?;

        // Merge with first-wins semantics, collecting diagnostics
        let (partial, diagnostics) = PartialConfig::merge(configs);

        Self::from_partial(partial, diagnostics)
    }

    /// Convert a PartialConfig to a Config, validating all fields
    ///
    /// Takes diagnostics from the merge step and adds validation diagnostics.
    /// Returns Ok((Config, diagnostics)) if no errors, Err if there are errors.
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), Box<dyn std::error::Error>> {
        let source = partial.source;

        let logging = if let Some(partial_logging) = partial.logging {
            LoggingConfig {
                level: partial_logging
                    .level
                    .map(|s| *s.get_ref())
                    .unwrap_or_default(),
            }
        } else {
            LoggingConfig::default()
        };

        let monitor = convert_monitor(partial.monitor, &source, &mut diagnostics);

        let mut persons = Vec::new();
        for (name, p) in partial.persons.unwrap_or_default() {
            match p.notify {
                Some(notify) => persons.push(PersonConfig {
                    name,
                    notify,
                    tracker: p.tracker,
                    cooldown: p.cooldown.unwrap_or(0),
                }),
                None => diagnostics.push(Diagnostic::Error(Error::Validation(ValidationError {
                    field_path: format!("persons.{}.notify", name),
                    message: "notify target is required".to_string(),
                    span: None,
                    source: source.clone(),
                }))),
            }
        }

        let integrations =
            convert_integrations(partial.integrations, &source, &mut diagnostics);

        if monitor.low_battery_threshold <= monitor.critical_battery_threshold {
            diagnostics.push(Diagnostic::Warning(Warning::ThresholdOrdering {
                low: monitor.low_battery_threshold,
                critical: monitor.critical_battery_threshold,
            }));
        }

        if persons.is_empty() {
            diagnostics.push(Diagnostic::Warning(Warning::NoPersons));
        }

        let config = Config {
            logging,
            monitor,
            persons,
            integrations,
        };

        let has_errors = diagnostics.iter().any(|d| d.is_error());

        if has_errors {
            Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format_diagnostics(&diagnostics),
            )))
        } else {
            Ok((config, diagnostics))
        }
    }
}

fn convert_monitor(
    partial: Option<PartialMonitorConfig>,
    source: &Option<SourceInfo>,
    diagnostics: &mut Vec<Diagnostic>,
) -> MonitorConfig {
    let Some(partial) = partial else {
        return MonitorConfig::default();
    };

    let mut validation_error = |field_path: &str, message: String, span| {
        diagnostics.push(Diagnostic::Error(Error::Validation(ValidationError {
            field_path: field_path.to_string(),
            message,
            span,
            source: source.clone(),
        })));
    };

    let mut threshold = |field_path: &str, spanned: Option<toml::Spanned<u8>>, default: u8| {
        let Some(spanned) = spanned else {
            return default;
        };
        let span = spanned.span();
        let value = spanned.into_inner();
        if value > 100 {
            validation_error(
                field_path,
                format!("threshold must be between 0 and 100, got {}", value),
                Some(span),
            );
            default
        } else {
            value
        }
    };

    let low = threshold(
        "monitor.low_battery_threshold",
        partial.low_battery_threshold,
        DEFAULT_LOW_THRESHOLD,
    );
    let critical = threshold(
        "monitor.critical_battery_threshold",
        partial.critical_battery_threshold,
        DEFAULT_CRITICAL_THRESHOLD,
    );

    let check_time = match partial.check_time {
        Some(spanned) => {
            let span = spanned.span();
            let raw = spanned.into_inner();
            match NaiveTime::parse_from_str(&raw, "%H:%M:%S") {
                Ok(time) => time,
                Err(e) => {
                    validation_error(
                        "monitor.check_time",
                        format!("invalid time '{}' (expected HH:MM:SS): {}", raw, e),
                        Some(span),
                    );
                    default_check_time()
                }
            }
        }
        None => default_check_time(),
    };

    let timezone = match partial.timezone {
        Some(spanned) => {
            let span = spanned.span();
            let raw = spanned.into_inner();
            match raw.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    validation_error(
                        "monitor.timezone",
                        format!("unknown timezone '{}'", raw),
                        Some(span),
                    );
                    DEFAULT_TIMEZONE
                }
            }
        }
        None => DEFAULT_TIMEZONE,
    };

    let exclude = partial
        .exclude
        .map(|s| s.into_inner().into_iter().collect())
        .unwrap_or_default();

    MonitorConfig {
        low_battery_threshold: low,
        critical_battery_threshold: critical,
        check_time,
        timezone,
        exclude,
    }
}

fn convert_integrations(
    partial: Option<PartialIntegrationsConfig>,
    source: &Option<SourceInfo>,
    diagnostics: &mut Vec<Diagnostic>,
) -> IntegrationsConfig {
    let Some(partial) = partial else {
        return IntegrationsConfig::default();
    };

    IntegrationsConfig {
        ha: partial.ha.map(|p| convert_ha(p, source, diagnostics)),
        mqtt: partial.mqtt.map(|p| convert_mqtt(p, source, diagnostics)),
    }
}

fn convert_ha(
    partial: PartialHaConfig,
    source: &Option<SourceInfo>,
    diagnostics: &mut Vec<Diagnostic>,
) -> HaConfig {
    let enabled = partial.enabled.unwrap_or(true);

    let mut required = |field_path: &str, value: Option<String>| match value {
        Some(v) => v,
        None => {
            // Credentials may be omitted when the section is disabled
            if enabled {
                diagnostics.push(Diagnostic::Error(Error::Validation(ValidationError {
                    field_path: field_path.to_string(),
                    message: "required when the HA integration is enabled".to_string(),
                    span: None,
                    source: source.clone(),
                })));
            }
            String::new() // Default for error recovery
        }
    };

    let url = required("integrations.ha.url", partial.url);
    let token = required("integrations.ha.token", partial.token);

    HaConfig { enabled, url, token }
}

fn convert_mqtt(
    partial: PartialMqttConfig,
    source: &Option<SourceInfo>,
    diagnostics: &mut Vec<Diagnostic>,
) -> MqttConfig {
    let mut required = |field_path: &str, value: Option<String>| match value {
        Some(v) => v,
        None => {
            diagnostics.push(Diagnostic::Error(Error::Validation(ValidationError {
                field_path: field_path.to_string(),
                message: "field is required".to_string(),
                span: None,
                source: source.clone(),
            })));
            String::new() // Default for error recovery
        }
    };

    let broker = required("integrations.mqtt.broker", partial.broker);
    let client_id = required("integrations.mqtt.client_id", partial.client_id);

    MqttConfig {
        broker,
        port: partial.port.unwrap_or(DEFAULT_MQTT_PORT),
        client_id,
        action_topic: partial
            .action_topic
            .unwrap_or_else(|| DEFAULT_ACTION_TOPIC.to_string()),
        username: partial.username,
        password: partial.password,
    }
}
