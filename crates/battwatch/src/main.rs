use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use battwatch::config::Config;
use battwatch::engine::{BatteryEvaluator, HubClient};
use battwatch::runtime::{Runtime, Schedule};

/// Battery monitor for a home-automation hub
#[derive(Debug, Parser)]
#[command(name = "battwatch", version)]
struct Args {
    /// TOML config file(s), merged with first-wins semantics
    #[arg(short, long = "config", default_value = "battwatch.toml")]
    config: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (config, diagnostics) = match Config::from_files(&args.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };
    if !diagnostics.is_empty() {
        eprint!("{}", battwatch::format_diagnostics(&diagnostics));
    }

    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.logging.level))
        .init();

    info!("battwatch starting");
    info!(
        low = config.monitor.low_battery_threshold,
        critical = config.monitor.critical_battery_threshold,
        check_time = %config.monitor.check_time,
        timezone = %config.monitor.timezone,
        persons = config.persons.len(),
        excluded = config.monitor.exclude.len(),
        "loaded configuration"
    );

    let hub = build_hub(&config)?;

    let (action_tx, action_rx) = mpsc::channel(16);
    spawn_action_bridge(&config, action_tx);

    let schedule = Schedule::new(config.monitor.check_time, config.monitor.timezone);
    let evaluator = BatteryEvaluator::new(config.monitor, config.persons);

    Runtime::new(evaluator, hub, schedule, action_rx).run().await?;

    info!("battwatch shutdown complete");

    Ok(())
}

#[cfg(feature = "integration_ha")]
fn build_hub(config: &Config) -> anyhow::Result<Arc<dyn HubClient>> {
    let ha = config
        .integrations
        .ha
        .as_ref()
        .filter(|c| c.enabled)
        .ok_or_else(|| anyhow::anyhow!("no enabled [integrations.ha] section configured"))?;

    info!(url = %ha.url, "using Home Assistant hub");
    Ok(Arc::new(battwatch::integrations::ha::HaClient::new(ha)?))
}

#[cfg(not(feature = "integration_ha"))]
fn build_hub(_config: &Config) -> anyhow::Result<Arc<dyn HubClient>> {
    anyhow::bail!("built without the integration_ha feature; no hub client available")
}

/// Start the MQTT action bridge if one is configured.
///
/// Dropping the sender (no bridge) closes the runtime's action channel.
#[cfg(feature = "integration_mqtt")]
fn spawn_action_bridge(config: &Config, tx: mpsc::Sender<battwatch::engine::ActionEvent>) {
    use battwatch::integrations::mqtt::{ActionBridge, RumqttcClient};

    match &config.integrations.mqtt {
        Some(mqtt) => {
            let client = RumqttcClient::new(mqtt);
            let bridge = ActionBridge::new(client, mqtt.action_topic.clone());
            tokio::spawn(bridge.run(tx));
        }
        None => {
            info!("no [integrations.mqtt] section; dismiss actions disabled");
        }
    }
}

#[cfg(not(feature = "integration_mqtt"))]
fn spawn_action_bridge(_config: &Config, _tx: mpsc::Sender<battwatch::engine::ActionEvent>) {
    info!("built without the integration_mqtt feature; dismiss actions disabled");
}
