//! Battery evaluation core: entity snapshots, severity classification, and
//! the per-person notification decision.

mod classify;
mod evaluator;
mod hub;
mod snapshot;

pub use classify::build_report;
pub use classify::entity_kind;
pub use classify::parse_percentage;
pub use classify::severity_for_level;
pub use classify::BatteryReport;
pub use classify::EntityKind;
pub use classify::Reading;
pub use classify::ReportEntry;
pub use classify::Severity;
pub use evaluator::BatteryEvaluator;
pub use evaluator::Dispatch;
pub use evaluator::NotificationState;
pub use evaluator::DISMISS_DAYS;
pub use hub::ActionEvent;
pub use hub::HubClient;
pub use hub::HubError;
pub use snapshot::EntityState;
pub use snapshot::Presence;
pub use snapshot::StateSnapshot;
