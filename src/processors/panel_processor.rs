use crate::context::EntryContext;
use crate::entities::StateSource;
use crate::entities::alarm_panel::AlarmPanel;
use crate::home_assistant::alarm_control_panel::{
    AlarmCommand, AlarmControlPanelDiscoveryPayload, AlarmFeature,
};
use crate::home_assistant::availability::Availability;
use crate::home_assistant::device::Device;
use crate::home_assistant::topics;
use crate::inim_api::inim_client::InimApiTrait;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::mqtt_publisher::HaPublisher;
use crate::processors::{ProcessorState, SnapshotProcessor};
use crate::scenario::ArmMode;
use rumqttc::QoS;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, trace};

#[derive(Clone)]
pub struct PanelProcessor<T, P> {
    pub ctx: EntryContext<T, P>,
}

impl<T, P> PanelProcessor<T, P>
where
    T: InimApiTrait + Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    pub fn discovery_payload(
        &self,
        panel: &AlarmPanel,
        device: &Device,
    ) -> AlarmControlPanelDiscoveryPayload {
        let device_id = &self.ctx.device_id;
        let panel_id = panel.unique_id();
        AlarmControlPanelDiscoveryPayload {
            name: panel.name().to_string(),
            unique_id: panel_id.to_string(),
            device: device.clone(),
            state_topic: topics::panel_state(device_id, panel_id),
            command_topic: topics::panel_command(device_id, panel_id),
            payload_arm_away: AlarmCommand::ArmAway.as_payload().to_string(),
            payload_arm_home: AlarmCommand::ArmHome.as_payload().to_string(),
            payload_arm_night: AlarmCommand::ArmNight.as_payload().to_string(),
            payload_arm_vacation: AlarmCommand::ArmVacation.as_payload().to_string(),
            payload_disarm: AlarmCommand::Disarm.as_payload().to_string(),
            code: None,
            code_arm_required: Some(false),
            code_disarm_required: Some(false),
            json_attributes_topic: Some(topics::panel_attributes(device_id, panel_id)),
            availability: Some(vec![Availability::online_offline(&topics::availability(
                device_id,
            ))]),
            availability_mode: None, //defaults to "latest"
            supported_features: Some(
                panel
                    .config
                    .scenarios
                    .configured_modes()
                    .filter_map(AlarmFeature::for_mode)
                    .collect(),
            ),
        }
    }

    /// Publishes the state shown for a panel, retained so Home Assistant
    /// picks it up after a restart.
    pub async fn publish_state(&self, panel_id: &str, mode: ArmMode) -> anyhow::Result<()> {
        self.ctx
            .ha_client
            .publish(
                &topics::panel_state(&self.ctx.device_id, panel_id),
                QoS::AtMostOnce,
                true,
                mode.as_str().to_string(),
            )
            .await?;
        Ok(())
    }

    async fn publish_discovery(&self, panel: &AlarmPanel, device: &Device) -> anyhow::Result<()> {
        let panel_id = panel.unique_id();
        let discovery_payload = serde_json::to_string(&self.discovery_payload(panel, device))?;
        trace!("{}", discovery_payload);

        self.ctx
            .ha_client
            .publish(
                &topics::panel_discovery(&self.ctx.discovery_prefix, panel_id),
                QoS::AtLeastOnce,
                true,
                discovery_payload,
            )
            .await?;
        self.ctx
            .ha_client
            .subscribe(&topics::panel_command(&self.ctx.device_id, panel_id))
            .await?;
        Ok(())
    }

    async fn publish_panel(
        &self,
        panel: &AlarmPanel,
        displayed: Option<ArmMode>,
        snapshot: &DeviceSnapshot,
    ) -> anyhow::Result<()> {
        let panel_id = panel.unique_id();
        if let Some(mode) = displayed {
            self.publish_state(panel_id, mode).await?;
        }

        let active = snapshot
            .device(&self.ctx.device_id)
            .map(|device| device.active_scenarios.codes())
            .unwrap_or_default();
        let last_polled = self
            .ctx
            .poll_state
            .borrow()
            .last_updated
            .map(|at| at.to_rfc3339());
        let attributes = json!({
            "active_scenarios": active,
            "device_id": self.ctx.device_id,
            "last_polled": last_polled,
        });
        self.ctx
            .ha_client
            .publish(
                &topics::panel_attributes(&self.ctx.device_id, panel_id),
                QoS::AtMostOnce,
                true,
                attributes.to_string(),
            )
            .await?;
        Ok(())
    }
}

impl<T, P> SnapshotProcessor for PanelProcessor<T, P>
where
    T: InimApiTrait + Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    async fn handle(
        &self,
        snapshot: Arc<DeviceSnapshot>,
        processor_state: Arc<RwLock<ProcessorState>>,
    ) -> anyhow::Result<()> {
        // Update every panel under one short write lock, publish afterwards
        let (device, published_discovery, updates) = {
            let mut state = processor_state.write().await;
            let updates: Vec<(AlarmPanel, Option<ArmMode>)> = state
                .panels
                .iter_mut()
                .map(|panel| {
                    let displayed = panel.update(&snapshot);
                    (panel.clone(), displayed)
                })
                .collect();
            (
                state.device.clone(),
                state.published_discovery.clone(),
                updates,
            )
        };

        for (panel, displayed) in updates {
            let panel_id = panel.unique_id().to_string();
            if published_discovery.insert(panel_id.clone())
                && let Err(e) = self.publish_discovery(&panel, &device).await
            {
                // Retry discovery with the next snapshot
                published_discovery.remove(&panel_id);
                error!("Error publishing discovery for {}: {:?}", panel_id, e);
                return Err(e);
            }
            self.publish_panel(&panel, displayed, &snapshot).await?;
        }
        Ok(())
    }
}
