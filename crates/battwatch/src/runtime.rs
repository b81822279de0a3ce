//! Daily scheduling and the main check loop.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::{ActionEvent, BatteryEvaluator, HubClient};

/// Daily check schedule: a wall-clock time in a fixed timezone.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    check_time: NaiveTime,
    timezone: Tz,
}

impl Schedule {
    pub fn new(check_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            check_time,
            timezone,
        }
    }

    /// UTC instant of the next check strictly after `now`.
    pub fn next_occurrence(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_now = now.with_timezone(&self.timezone);
        let mut date = local_now.date_naive();
        if local_now.time() >= self.check_time {
            date = date.succ_opt().unwrap_or(date);
        }

        let naive = date.and_time(self.check_time);
        match self.timezone.from_local_datetime(&naive).earliest() {
            Some(dt) => dt.with_timezone(&Utc),
            // Spring-forward gap: the configured wall-clock time does not
            // exist on this date, run an hour later instead
            None => match self
                .timezone
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
            {
                Some(dt) => dt.with_timezone(&Utc),
                None => now + Duration::days(1),
            },
        }
    }
}

/// Owns the evaluator and drives it: one check at startup, one per day at
/// the scheduled time, dismiss actions applied as they arrive.
pub struct Runtime {
    evaluator: BatteryEvaluator,
    hub: Arc<dyn HubClient>,
    schedule: Schedule,
    actions: mpsc::Receiver<ActionEvent>,
}

impl Runtime {
    pub fn new(
        evaluator: BatteryEvaluator,
        hub: Arc<dyn HubClient>,
        schedule: Schedule,
        actions: mpsc::Receiver<ActionEvent>,
    ) -> Self {
        Self {
            evaluator,
            hub,
            schedule,
            actions,
        }
    }

    /// Run until Ctrl-C.
    pub async fn run(mut self) -> anyhow::Result<()> {
        // Initial check on startup, matching the daily one
        self.check().await;

        let mut actions_open = true;
        loop {
            let now = Utc::now();
            let next = self.schedule.next_occurrence(now);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next, "next battery check scheduled");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.check().await;
                }
                action = self.actions.recv(), if actions_open => {
                    match action {
                        Some(ActionEvent::Dismiss { person }) => self.dismiss(&person),
                        None => {
                            info!("action channel closed, dismiss actions disabled");
                            actions_open = false;
                        }
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    info!("received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one battery check cycle.
    ///
    /// A snapshot fetch failure skips the cycle without touching any
    /// per-person state; delivery failures are logged and do not retry.
    pub async fn check(&mut self) {
        info!("running battery check");

        let snapshot = match self.hub.states().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("failed to fetch entity states: {}", e);
                return;
            }
        };

        let dispatches = self.evaluator.evaluate(&snapshot, Utc::now());

        for dispatch in dispatches {
            match self
                .hub
                .notify(&dispatch.target, &dispatch.notification)
                .await
            {
                Ok(()) => {
                    info!(person = %dispatch.person, target = %dispatch.target, "notification sent");
                }
                Err(e) => {
                    // Best effort: the cooldown timestamp stands regardless
                    error!(person = %dispatch.person, "failed to deliver notification: {}", e);
                }
            }
        }
    }

    fn dismiss(&mut self, person: &str) {
        match self.evaluator.dismiss(person, Utc::now()) {
            Some(until) => info!(person = %person, until = %until, "notifications dismissed"),
            None => warn!(person = %person, "dismiss action for unknown person"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MonitorConfig, PersonConfig};
    use crate::engine::{EntityState, HubError, StateSnapshot};
    use crate::notify::Notification;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeHub {
        snapshot: StateSnapshot,
        fail_states: bool,
        sent: Mutex<Vec<(String, Notification)>>,
    }

    #[async_trait]
    impl HubClient for FakeHub {
        async fn states(&self) -> Result<StateSnapshot, HubError> {
            if self.fail_states {
                Err(HubError::Transport("connection refused".to_string()))
            } else {
                Ok(self.snapshot.clone())
            }
        }

        async fn notify(
            &self,
            target: &str,
            notification: &Notification,
        ) -> Result<(), HubError> {
            self.sent
                .lock()
                .unwrap()
                .push((target.to_string(), notification.clone()));
            Ok(())
        }
    }

    fn evaluator(cooldown: u64) -> BatteryEvaluator {
        BatteryEvaluator::new(
            MonitorConfig::default(),
            vec![PersonConfig {
                name: "anna".to_string(),
                notify: "mobile_app_anna".to_string(),
                tracker: None,
                cooldown,
            }],
        )
    }

    fn stockholm_schedule() -> Schedule {
        Schedule::new(
            NaiveTime::from_hms_opt(18, 15, 0).unwrap(),
            chrono_tz::Europe::Stockholm,
        )
    }

    #[test]
    fn test_next_occurrence_same_day() {
        let schedule = stockholm_schedule();
        // 10:00 UTC is 11:00 in Stockholm (CET, +01:00)
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let next = schedule.next_occurrence(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 17, 15, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_rolls_to_tomorrow() {
        let schedule = stockholm_schedule();
        // 18:00 UTC is 19:00 in Stockholm, past the 18:15 check time
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
        let next = schedule.next_occurrence(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 17, 15, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_exactly_at_check_time_is_tomorrow() {
        let schedule = stockholm_schedule();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 17, 15, 0).unwrap();
        let next = schedule.next_occurrence(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 17, 15, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_skips_spring_forward_gap() {
        // Stockholm jumps 02:00 -> 03:00 on 2024-03-31; 02:30 does not exist
        let schedule = Schedule::new(
            NaiveTime::from_hms_opt(2, 30, 0).unwrap(),
            chrono_tz::Europe::Stockholm,
        );
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let next = schedule.next_occurrence(now);
        // Pushed to 03:30 CEST (+02:00) = 01:30 UTC
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 31, 1, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_check_sends_notifications() {
        let hub = Arc::new(FakeHub {
            snapshot: StateSnapshot::new(vec![EntityState::new(
                "sensor.motion_battery_level",
                "5",
            )]),
            ..FakeHub::default()
        });
        let (_tx, rx) = mpsc::channel(1);
        let mut runtime = Runtime::new(evaluator(0), hub.clone(), stockholm_schedule(), rx);

        runtime.check().await;

        let sent = hub.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "mobile_app_anna");
        assert!(sent[0].1.message.contains("sensor.motion_battery_level: 5%"));
    }

    #[tokio::test]
    async fn test_back_to_back_checks_respect_cooldown() {
        let hub = Arc::new(FakeHub {
            snapshot: StateSnapshot::new(vec![EntityState::new(
                "sensor.motion_battery_level",
                "5",
            )]),
            ..FakeHub::default()
        });
        let (_tx, rx) = mpsc::channel(1);
        let mut runtime = Runtime::new(evaluator(3600), hub.clone(), stockholm_schedule(), rx);

        runtime.check().await;
        runtime.check().await;

        assert_eq!(hub.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_snapshot_skips_cycle() {
        let hub = Arc::new(FakeHub {
            fail_states: true,
            ..FakeHub::default()
        });
        let (_tx, rx) = mpsc::channel(1);
        let mut runtime = Runtime::new(evaluator(0), hub.clone(), stockholm_schedule(), rx);

        runtime.check().await;

        assert!(hub.sent.lock().unwrap().is_empty());
        assert!(runtime.evaluator.notification_state("anna").is_none());
    }
}
