use crate::engine::BatteryReport;

use super::{dismiss_action, Notification, NotificationAction};

const TITLE: &str = "Battery warning";
const CRITICAL_HEADER: &str = "🚨 CRITICAL battery:";
const LOW_HEADER: &str = "⚠️ Low battery:";
const DISMISS_TITLE: &str = "Dismiss for 3 days";

/// Build the consolidated notification for one person.
///
/// The critical section comes first, then the low section, each only when it
/// has entries. The single action button lets the recipient silence further
/// warnings for three days.
pub fn compose(report: &BatteryReport, person: &str) -> Notification {
    let mut parts: Vec<String> = Vec::new();

    if !report.critical.is_empty() {
        parts.push(CRITICAL_HEADER.to_string());
        for entry in &report.critical {
            parts.push(format!("• {}: {}", entry.name, entry.reading));
        }
    }

    if !report.low.is_empty() {
        if !parts.is_empty() {
            parts.push(String::new()); // Blank line between sections
        }
        parts.push(LOW_HEADER.to_string());
        for entry in &report.low {
            parts.push(format!("• {}: {}", entry.name, entry.reading));
        }
    }

    Notification {
        title: TITLE.to_string(),
        message: parts.join("\n"),
        actions: vec![NotificationAction {
            action: dismiss_action(person),
            title: DISMISS_TITLE.to_string(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Reading, ReportEntry, Severity};

    fn entry(name: &str, reading: Reading) -> ReportEntry {
        ReportEntry {
            name: name.to_string(),
            reading,
        }
    }

    #[test]
    fn test_compose_both_sections() {
        let report = BatteryReport {
            critical: vec![
                entry("Motion Sensor", Reading::Percent(5.0)),
                entry("Camera", Reading::Indicator(Severity::Critical)),
            ],
            low: vec![entry("Hall Door", Reading::Percent(18.0))],
        };

        let notification = compose(&report, "anna");

        assert_eq!(notification.title, "Battery warning");
        insta::assert_snapshot!(notification.message, @r"
        🚨 CRITICAL battery:
        • Motion Sensor: 5%
        • Camera: CRITICAL

        ⚠️ Low battery:
        • Hall Door: 18%
        ");
    }

    #[test]
    fn test_compose_low_only_has_no_leading_blank_line() {
        let report = BatteryReport {
            critical: vec![],
            low: vec![entry("Hall Door", Reading::Percent(18.0))],
        };

        let notification = compose(&report, "anna");
        assert_eq!(notification.message, "⚠️ Low battery:\n• Hall Door: 18%");
    }

    #[test]
    fn test_compose_action_button() {
        let report = BatteryReport {
            critical: vec![entry("Camera", Reading::Indicator(Severity::Critical))],
            low: vec![],
        };

        let notification = compose(&report, "bjorn");
        assert_eq!(notification.actions.len(), 1);
        assert_eq!(notification.actions[0].action, "battwatch.dismiss.bjorn");
        assert_eq!(notification.actions[0].title, "Dismiss for 3 days");
    }
}
