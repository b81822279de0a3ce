use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::{MonitorConfig, PersonConfig};
use crate::notify::{self, Notification};

use super::classify::{build_report, BatteryReport};
use super::snapshot::{Presence, StateSnapshot};

/// How long a dismissal action silences a person's notifications.
pub const DISMISS_DAYS: i64 = 3;

/// Per-person notification bookkeeping.
///
/// Lives for the lifetime of the evaluator; a restart resets it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NotificationState {
    pub last_sent: Option<DateTime<Utc>>,
    pub dismissed_until: Option<DateTime<Utc>>,
}

/// A notification the evaluator decided to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub person: String,
    pub target: String,
    pub notification: Notification,
}

/// Classifies battery entities and decides, per person, whether to notify.
///
/// Owns the per-person cooldown/dismissal ledger. Callers are expected to
/// deliver every returned [`Dispatch`]; `last_sent` is updated optimistically
/// when the dispatch is emitted, not when delivery succeeds.
pub struct BatteryEvaluator {
    monitor: MonitorConfig,
    persons: Vec<PersonConfig>,
    ledger: HashMap<String, NotificationState>,
}

impl BatteryEvaluator {
    pub fn new(monitor: MonitorConfig, persons: Vec<PersonConfig>) -> Self {
        Self {
            monitor,
            persons,
            ledger: HashMap::new(),
        }
    }

    /// Run one evaluation cycle against a snapshot.
    ///
    /// Returns the dispatches to deliver. When nothing is low, no per-person
    /// state is touched.
    pub fn evaluate(&mut self, snapshot: &StateSnapshot, now: DateTime<Utc>) -> Vec<Dispatch> {
        let report = build_report(snapshot, &self.monitor);

        if report.is_empty() {
            info!("no low battery devices found");
            return Vec::new();
        }

        info!(
            critical = report.critical.len(),
            low = report.low.len(),
            "low battery devices found"
        );

        let mut dispatches = Vec::new();

        for person in &self.persons {
            if let Some(tracker) = &person.tracker {
                if snapshot.presence(tracker) == Presence::Away {
                    debug!(person = %person.name, tracker = %tracker, "away, skipping");
                    continue;
                }
            }

            let state = self.ledger.entry(person.name.clone()).or_default();

            if let Some(until) = state.dismissed_until {
                if until > now {
                    debug!(person = %person.name, until = %until, "dismissed, skipping");
                    continue;
                }
            }

            if let Some(last_sent) = state.last_sent {
                let ready_at = last_sent + Duration::seconds(person.cooldown as i64);
                if ready_at > now {
                    debug!(
                        person = %person.name,
                        elapsed = (now - last_sent).num_seconds(),
                        cooldown = person.cooldown,
                        "cooldown active, skipping"
                    );
                    continue;
                }
            }

            state.last_sent = Some(now);
            dispatches.push(Dispatch {
                person: person.name.clone(),
                target: person.notify.clone(),
                notification: notify::compose(&report, &person.name),
            });
        }

        dispatches
    }

    /// Handle a dismissal action: silence a person for [`DISMISS_DAYS`].
    ///
    /// Returns the end of the dismissal window, or None for an unknown person.
    pub fn dismiss(&mut self, person: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.persons.iter().any(|p| p.name == person) {
            return None;
        }

        let until = now + Duration::days(DISMISS_DAYS);
        self.ledger.entry(person.to_string()).or_default().dismissed_until = Some(until);
        Some(until)
    }

    /// Current ledger entry for a person, if any cycle has touched it.
    pub fn notification_state(&self, person: &str) -> Option<&NotificationState> {
        self.ledger.get(person)
    }

    /// Classify a snapshot without making any notification decisions.
    pub fn report(&self, snapshot: &StateSnapshot) -> BatteryReport {
        build_report(snapshot, &self.monitor)
    }
}
