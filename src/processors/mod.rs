use crate::context::EntryContext;
use crate::entities::Entity;
use crate::entities::alarm_panel::AlarmPanel;
use crate::entities::zone_sensor::ZoneSensor;
use crate::home_assistant::availability::AvailabilityState;
use crate::home_assistant::device::Device;
use crate::home_assistant::topics;
use crate::inim_api::inim_client::InimApiTrait;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::mqtt_publisher::HaPublisher;
use dashmap::DashSet;
use panel_processor::PanelProcessor;
use rumqttc::QoS;
use std::sync::Arc;
use tokio::join;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};
use zones_processor::ZonesProcessor;

pub mod ha_processor;
pub mod panel_processor;
pub mod zones_processor;

/// Trait for a processor that publishes a fresh snapshot to Home Assistant
pub trait SnapshotProcessor: Send + Sync + 'static {
    fn handle(
        &self,
        snapshot: Arc<DeviceSnapshot>,
        processor_state: Arc<RwLock<ProcessorState>>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

pub struct ProcessorState {
    pub device: Device,
    pub panels: Vec<AlarmPanel>,
    pub zones: Vec<ZoneSensor>,
    /// Shared with the HA event loop, which clears it when the broker
    /// connection drops.
    pub published_discovery: Arc<DashSet<String>>,
}

impl ProcessorState {
    pub fn new(
        device: Device,
        entities: Vec<Entity>,
        published_discovery: Arc<DashSet<String>>,
    ) -> Self {
        let mut panels = Vec::new();
        let mut zones = Vec::new();
        for entity in entities {
            debug!("Registering entity {}", entity.unique_id());
            match entity {
                Entity::AlarmPanel(panel) => panels.push(panel),
                Entity::ZoneSensor(sensor) => zones.push(sensor),
            }
        }
        Self {
            device,
            panels,
            zones,
            published_discovery,
        }
    }

    pub fn panel(&self, unique_id: &str) -> Option<&AlarmPanel> {
        self.panels
            .iter()
            .find(|panel| panel.config.unique_id == unique_id)
    }

    pub fn panel_mut(&mut self, unique_id: &str) -> Option<&mut AlarmPanel> {
        self.panels
            .iter_mut()
            .find(|panel| panel.config.unique_id == unique_id)
    }
}

/// Home Assistant device record that groups every entity of one INIM device.
pub fn ha_device(device_id: &str, name: Option<&str>, model: Option<&str>) -> Device {
    Device {
        identifiers: vec![format!("inim_{}", device_id)],
        manufacturer: "INIM".to_string(),
        model: model.unwrap_or("Inim Alarm").to_string(),
        name: name
            .filter(|n| !n.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("INIM {}", device_id)),
        sw_version: None,
        via_device: None,
    }
}

/// Device record for Home Assistant. The snapshot usually names the device;
/// otherwise the account's device list is asked, and failing that a generic
/// name is used.
pub async fn get_ha_device<T: InimApiTrait>(
    client: &T,
    device_id: &str,
    snapshot: &DeviceSnapshot,
) -> Device {
    if let Some(device) = snapshot.device(device_id)
        && !device.name.trim().is_empty()
    {
        return ha_device(device_id, Some(&device.name), device.model.as_deref());
    }
    match client.get_devices().await {
        Ok(devices) => {
            let device = devices.device(device_id);
            ha_device(
                device_id,
                device.map(|d| d.name.as_str()),
                device.and_then(|d| d.model.as_deref()),
            )
        }
        Err(e) => {
            warn!(
                "Error occurred while listing devices, using fallback. {:?}",
                e
            );
            ha_device(device_id, None, None)
        }
    }
}

pub async fn publish_availability<P: HaPublisher>(
    ha_client: &P,
    device_id: &str,
    availability: AvailabilityState,
) -> anyhow::Result<()> {
    ha_client
        .publish(
            &topics::availability(device_id),
            QoS::AtLeastOnce,
            true,
            availability.as_str().to_string(),
        )
        .await?;
    Ok(())
}

/// Follows the coordinator: publishes availability after every poll and runs
/// the processors on each fresh snapshot. Returns when publishing fails or
/// the coordinator goes away.
pub async fn publish_poll_updates<T, P>(
    ctx: EntryContext<T, P>,
    processor_state: Arc<RwLock<ProcessorState>>,
) -> anyhow::Result<()>
where
    T: InimApiTrait + Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    let panel_processor = PanelProcessor { ctx: ctx.clone() };
    let zones_processor = ZonesProcessor { ctx: ctx.clone() };
    let mut poll_state = ctx.poll_state.clone();
    // Publish whatever the first refresh already delivered
    poll_state.mark_changed();

    loop {
        poll_state.changed().await?;
        let state = poll_state.borrow_and_update().clone();

        if !state.last_update_success {
            publish_availability(&ctx.ha_client, &ctx.device_id, AvailabilityState::Offline)
                .await?;
            continue;
        }
        publish_availability(&ctx.ha_client, &ctx.device_id, AvailabilityState::Online).await?;

        let Some(snapshot) = state.snapshot else {
            continue;
        };
        debug!("Publishing snapshot of device {}", ctx.device_id);
        let (panels, zones) = join!(
            panel_processor.handle(snapshot.clone(), processor_state.clone()),
            zones_processor.handle(snapshot, processor_state.clone())
        );
        if let Err(e) = panels {
            error!("Error occurred while processing panel data: {:?}", e);
        }
        if let Err(e) = zones {
            error!("Error occurred while processing zone data: {:?}", e);
        }
    }
}
