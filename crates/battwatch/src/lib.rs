pub mod config;
pub mod engine;
pub mod integrations;
pub mod notify;
pub mod runtime;

pub use config::format_diagnostics;
pub use config::Config;
pub use config::LogLevel;
pub use engine::BatteryEvaluator;
pub use engine::BatteryReport;
pub use engine::EntityState;
pub use engine::HubClient;
pub use engine::Severity;
pub use engine::StateSnapshot;
pub use runtime::Runtime;
pub use runtime::Schedule;
