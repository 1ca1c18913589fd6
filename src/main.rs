mod config;
mod config_flow;
mod context;
mod coordinator;
mod entities;
mod home_assistant;
pub mod inim_api;
mod mqtt_publisher;
mod processors;
mod scenario;

use tracing::{error, info, trace, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt};

use crate::config::{Config, LoggingConfig};
use crate::config_flow::{ConfigFlow, InimAuthenticator, run_interactive};
use crate::context::EntryContext;
use crate::coordinator::PollCoordinator;
use crate::entities::setup_entities;
use crate::home_assistant::alarm_control_panel::AlarmCommand;
use crate::home_assistant::availability::AvailabilityState;
use crate::home_assistant::topics;
use crate::inim_api::cached_inim_client::CachedInimClient;
use crate::inim_api::inim_client::{InimApiTrait, InimClient};
use crate::processors::ha_processor::HaProcessor;
use crate::processors::{ProcessorState, get_ha_device, publish_availability, publish_poll_updates};
use anyhow::Context;
use clap::{Parser, Subcommand};
use dashmap::DashSet;
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tokio::sync::{RwLock, mpsc};
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "inim-mqtt-bridge")]
#[command(author, version, about = "Bridges INIM cloud alarm panels to Home Assistant")]
struct Cli {
    /// Path of the TOML configuration file
    #[arg(long, short, global = true, env = "INIM_BRIDGE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the INIM cloud and publish to Home Assistant (default)
    Run,
    /// Interactively enter credentials and panels, then write the config file
    Setup,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_bridge(&cli.config).await,
        Commands::Setup => run_setup(&cli.config).await,
    }
}

fn init_logging(logging: &LoggingConfig) {
    // Directory for logs
    let log_dir = &logging.directory;

    // One file per level
    let debug_file = rolling::daily(log_dir, &logging.debug_file);
    let info_file = rolling::daily(log_dir, &logging.info_file);
    let warn_file = rolling::daily(log_dir, &logging.warn_file);
    let error_file = rolling::daily(log_dir, &logging.error_file);

    // Build layers, filtering each level
    let debug_layer = fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(EnvFilter::new("debug"));

    let info_layer = fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::INFO);

    let warn_layer = fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let error_layer = fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    let console_layer = fmt::layer()
        .pretty()
        .with_filter(EnvFilter::new(&logging.console_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(debug_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .init();
}

/// Loads the config, writing an example file first when there is none.
fn load_config(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        println!("Config file not found. Creating example {}...", path.display());
        Config::save_example(path)?;
        println!("Please edit it with your settings (or run `setup`) and restart the application.");
        anyhow::bail!("no config file at {}", path.display());
    }
    Config::from_file(path).with_context(|| format!("invalid config {}", path.display()))
}

async fn run_setup(path: &Path) -> anyhow::Result<()> {
    let existing = Config::from_file(path).ok();
    let base = existing.clone().unwrap_or_else(Config::example);
    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(EnvFilter::new(&base.logging.console_level)))
        .init();

    let auth = InimAuthenticator {
        base_url: base.inim.base_url.clone(),
        request_timeout: Duration::from_secs(base.inim.request_timeout_seconds),
    };
    let mut flow = ConfigFlow::new(existing.as_ref());
    let entry = run_interactive(
        &mut flow,
        &auth,
        std::io::stdin().lock(),
        std::io::stdout(),
    )
    .await?;

    let title = entry.title.clone();
    entry.into_config(base)?.save(path)?;
    println!("Saved \"{}\" to {}", title, path.display());
    Ok(())
}

async fn run_bridge(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    init_logging(&config.logging);

    let inim_client = Arc::new(CachedInimClient::new(InimClient::new(
        &config.inim.base_url,
        &config.inim.username,
        &config.inim.password,
        &config.inim.client_id,
        Duration::from_secs(config.inim.request_timeout_seconds),
    )?));

    let device_id = config.inim.device_id.clone();
    let availability_topic = topics::availability(&device_id);

    let mut ha_options = MqttOptions::new(
        &config.home_assistant.client_id,
        &config.home_assistant.mqtt_host,
        config.home_assistant.mqtt_port,
    );
    ha_options.set_credentials(
        &config.home_assistant.mqtt_username,
        &config.home_assistant.mqtt_password,
    );
    ha_options.set_keep_alive(Duration::from_secs(
        config.intervals.mqtt_keep_alive_seconds,
    ));
    ha_options.set_last_will(LastWill::new(
        &availability_topic,
        AvailabilityState::Offline.as_str(),
        QoS::AtLeastOnce,
        true,
    ));
    let (ha_client, mut ha_eventloop) = AsyncClient::new(ha_options, config.limits.mqtt_queue_size);

    let published_discovery = Arc::new(DashSet::new());

    // Shared map: device id → command sender
    let senders: SenderMap = Arc::new(RwLock::new(HashMap::new()));

    // Run HA event loop in background
    let senders_router = senders.clone();
    let ha_published_discovery = published_discovery.clone();
    let ha_reconnect_delay = config.intervals.reconnect_delay();
    tokio::spawn(async move {
        loop {
            match ha_eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(p))) => {
                    let payload = String::from_utf8_lossy(&p.payload).to_string();

                    match command_topic_parser(&p.topic, &payload) {
                        None => {
                            warn!("Failed to parse topic: {:?}", p.topic);
                        }
                        Some(parse_result) => {
                            match senders_router.read().await.get(&parse_result.device_id) {
                                None => {
                                    error!(
                                        "Received command for device_id {} that is not in the senders map",
                                        parse_result.device_id
                                    );
                                }
                                Some(sender) => {
                                    if let Err(e) = sender.send(parse_result.command).await {
                                        error!("Failed to send command: {:?}", e);
                                    }
                                }
                            }
                        }
                    }
                }
                Ok(event) => trace!("{:?}", event),
                Err(e) => {
                    error!(
                        "HA event loop failed: {:?}. Forcing rediscovery and resubscriptions",
                        e
                    );
                    ha_published_discovery.clear();
                    tokio::time::sleep(ha_reconnect_delay).await;
                }
            }
        }
    });

    info!(
        "Bridging INIM device {} with {} panel(s)",
        device_id,
        config.panels.len()
    );
    loop {
        let (tx, rx) = mpsc::channel::<MqttCommand>(config.limits.command_channel_size);
        senders.write().await.insert(device_id.clone(), tx);
        if let Err(e) = run_entry(
            &config,
            inim_client.clone(),
            ha_client.clone(),
            rx,
            published_discovery.clone(),
        )
        .await
        {
            error!("INIM entry {} failed: {:?}", device_id, e);
            tokio::time::sleep(config.intervals.reconnect_delay()).await;
        }
    }
}

/// Sets up one config entry and runs it until polling or publishing breaks.
async fn run_entry<T>(
    config: &Config,
    inim_client: Arc<T>,
    ha_client: AsyncClient,
    mut rx: Receiver<MqttCommand>,
    published_discovery: Arc<DashSet<String>>,
) -> anyhow::Result<()>
where
    T: InimApiTrait + Send + Sync + 'static,
{
    let device_id = &config.inim.device_id;
    let coordinator = PollCoordinator::new(
        inim_client.clone(),
        device_id,
        config.intervals.scan_interval(),
    );

    let first = match coordinator.first_refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if let Err(publish_error) =
                publish_availability(&ha_client, device_id, AvailabilityState::Offline).await
            {
                warn!("Could not mark {} offline: {:?}", device_id, publish_error);
            }
            return Err(e.into());
        }
    };

    let ctx = EntryContext::new(
        config,
        inim_client.clone(),
        ha_client,
        coordinator.subscribe(),
        coordinator.refresh_handle(),
    );
    let device = get_ha_device(&*inim_client, &ctx.device_id, &first).await;
    let processor_state = Arc::new(RwLock::new(ProcessorState::new(
        device,
        setup_entities(&ctx.device_id, &ctx.panels, &first),
        published_discovery,
    )));

    let ha_processor = HaProcessor {
        ctx: ctx.clone(),
        processor_state: processor_state.clone(),
    };
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            if let Err(e) = ha_processor.process_ha_command(cmd).await {
                error!("Command processing failed: {:?}", e);
            }
        }
    });

    tokio::select! {
        result = publish_poll_updates(ctx, processor_state) => result,
        _ = coordinator.run() => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MqttCommand {
    SetPanel {
        device_id: String,
        panel_id: String,
        command: AlarmCommand,
    },
}

#[derive(Debug, PartialEq)]
pub struct TopicParseResult {
    pub device_id: String,
    pub command: MqttCommand,
}

pub fn command_topic_parser(topic: &str, payload: &str) -> Option<TopicParseResult> {
    let mut parts: Vec<&str> = topic.split('/').collect();
    if parts.len() > 6 {
        return None;
    }
    parts.resize(6, "");

    if payload.trim().is_empty() {
        error!("Empty payload for topic: {:?}", topic);
        // No command
        return None;
    }

    match (parts[0], parts[1], parts[2], parts[3], parts[4], parts[5]) {
        (topics::TOPIC_ROOT, "device", device_id, "panel", panel_id, "set")
            if !device_id.is_empty() && !panel_id.is_empty() =>
        {
            if let Some(command) = AlarmCommand::from_payload(payload) {
                Some(TopicParseResult {
                    device_id: device_id.to_string(),
                    command: MqttCommand::SetPanel {
                        device_id: device_id.to_string(),
                        panel_id: panel_id.to_string(),
                        command,
                    },
                })
            } else {
                error!(
                    "Unable to deserialize payload: {:?} for topic: {:?}",
                    payload, topic
                );
                None
            }
        }
        _ => None,
    }
}

type SenderMap = Arc<RwLock<HashMap<String, mpsc::Sender<MqttCommand>>>>;

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn parses_panel_command() {
        let parsed = command_topic_parser(
            "inim/device/42/panel/alarm_control_panel_casa/set",
            "ARM_AWAY",
        )
        .unwrap();

        assert_eq!(parsed.device_id, "42");
        assert_eq!(
            parsed.command,
            MqttCommand::SetPanel {
                device_id: "42".to_string(),
                panel_id: "alarm_control_panel_casa".to_string(),
                command: AlarmCommand::ArmAway,
            }
        );
    }

    #[test]
    fn rejects_unknown_payloads_and_topics() {
        let topic = "inim/device/42/panel/alarm_control_panel_casa/set";
        assert!(command_topic_parser(topic, "").is_none());
        assert!(command_topic_parser(topic, "TRIGGER").is_none());
        assert!(command_topic_parser("inim/device/42/panel/x/state", "DISARM").is_none());
        assert!(command_topic_parser("inim/device/42/zone/1/set", "DISARM").is_none());
        assert!(command_topic_parser("inim/device/42/panel/x/set/extra", "DISARM").is_none());
        assert!(command_topic_parser("alarm/device/42/panel/x/set", "DISARM").is_none());
    }

    #[test]
    fn cli_defaults_to_run_with_config_toml() {
        Cli::command().debug_assert();
        let cli = Cli::try_parse_from(["inim-mqtt-bridge"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["inim-mqtt-bridge", "setup", "--config", "x.toml"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Setup)));
        assert_eq!(cli.config, PathBuf::from("x.toml"));
    }
}
