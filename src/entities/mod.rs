//! Plain entity structs behind two capabilities: [`StateSource`] for values
//! derived from the latest poll, and [`CommandSink`] for entities that accept
//! commands. They know nothing about MQTT; the processors publish them.

pub mod alarm_panel;
pub mod zone_sensor;

use crate::config::PanelConfig;
use crate::inim_api::inim_client::{InimApiError, InimApiTrait};
use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::scenario::ArmMode;
use alarm_panel::AlarmPanel;
use tracing::{info, warn};
use zone_sensor::ZoneSensor;

pub trait StateSource {
    type State;

    fn unique_id(&self) -> &str;

    /// Recomputes state from `snapshot` and returns what should be displayed.
    /// `None` means there is nothing to display yet.
    fn update(&mut self, snapshot: &DeviceSnapshot) -> Option<Self::State>;
}

pub trait CommandSink {
    type Command: Copy + std::fmt::Debug;

    /// Scenario that carries out `command`. Fails without touching the network.
    fn scenario_for(&self, command: Self::Command) -> Result<ScenarioCode, DispatchError>;

    /// Records that the cloud accepted `command`.
    fn acknowledge(&mut self, command: Self::Command);
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("panel {panel:?} has no scenario configured for {mode}")]
    NoScenarioConfigured { panel: String, mode: ArmMode },

    #[error("no panel with id {0:?}")]
    UnknownPanel(String),

    #[error(transparent)]
    Api(#[from] InimApiError),
}

/// Activates the scenario for `command` on `device_id`. The sink is only
/// borrowed, so callers can release any lock around it before acknowledging.
pub async fn dispatch<S, T>(
    client: &T,
    device_id: &str,
    sink: &S,
    command: S::Command,
) -> Result<ScenarioCode, DispatchError>
where
    S: CommandSink,
    T: InimApiTrait,
{
    let scenario = sink.scenario_for(command)?;
    client.activate_scenario(device_id, scenario).await?;
    info!(
        "Activated scenario {} on device {} for {:?}",
        scenario, device_id, command
    );
    Ok(scenario)
}

#[derive(Debug, Clone)]
pub enum Entity {
    AlarmPanel(AlarmPanel),
    ZoneSensor(ZoneSensor),
}

impl Entity {
    pub fn unique_id(&self) -> &str {
        match self {
            Entity::AlarmPanel(panel) => panel.unique_id(),
            Entity::ZoneSensor(sensor) => sensor.unique_id(),
        }
    }
}

/// Builds every entity of one config entry: a panel per configured panel and
/// a sensor per zone present in the first snapshot.
pub fn setup_entities(
    device_id: &str,
    panels: &[PanelConfig],
    snapshot: &DeviceSnapshot,
) -> Vec<Entity> {
    let mut entities: Vec<Entity> = panels
        .iter()
        .map(|panel| Entity::AlarmPanel(AlarmPanel::new(device_id, panel.clone())))
        .collect();

    match snapshot.device(device_id) {
        Some(device) => entities.extend(
            device
                .zones
                .iter()
                .map(|zone| Entity::ZoneSensor(ZoneSensor::from_zone(device_id, zone))),
        ),
        None => warn!(
            "Device {} missing from the first snapshot, no zone sensors created",
            device_id
        ),
    }
    entities
}
