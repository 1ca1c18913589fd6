use crate::MqttCommand;
use crate::context::EntryContext;
use crate::entities::{CommandSink, DispatchError, dispatch};
use crate::home_assistant::alarm_control_panel::AlarmCommand;
use crate::inim_api::inim_client::InimApiTrait;
use crate::mqtt_publisher::HaPublisher;
use crate::processors::ProcessorState;
use crate::processors::panel_processor::PanelProcessor;
use crate::scenario::ArmMode;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Carries out commands Home Assistant sends to this entry's panels.
#[derive(Clone)]
pub struct HaProcessor<T, P> {
    pub ctx: EntryContext<T, P>,
    pub(crate) processor_state: Arc<RwLock<ProcessorState>>,
}

impl<T, P> HaProcessor<T, P>
where
    T: InimApiTrait + Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    /// Activates the scenario behind `command`, then shows the requested mode
    /// straight away and asks for an early poll to confirm it.
    pub async fn handle_panel_command(
        &self,
        panel_id: &str,
        command: AlarmCommand,
    ) -> Result<ArmMode, DispatchError> {
        let mode = command.target_mode();
        // Clone so no lock is held during the cloud call
        let panel = self
            .processor_state
            .read()
            .await
            .panel(panel_id)
            .cloned()
            .ok_or_else(|| DispatchError::UnknownPanel(panel_id.to_string()))?;

        dispatch(&self.ctx.client, &self.ctx.device_id, &panel, mode).await?;

        if let Some(panel) = self.processor_state.write().await.panel_mut(panel_id) {
            panel.acknowledge(mode);
        }
        Ok(mode)
    }

    pub async fn process_ha_command(&self, cmd: MqttCommand) -> anyhow::Result<()> {
        match cmd {
            MqttCommand::SetPanel {
                device_id,
                panel_id,
                command,
            } => {
                if device_id != self.ctx.device_id {
                    warn!(
                        "Ignoring {:?} for device {}, this entry serves {}",
                        command, device_id, self.ctx.device_id
                    );
                    return Ok(());
                }
                info!("Received {:?} for panel {}", command, panel_id);
                let mode = self.handle_panel_command(&panel_id, command).await?;
                // The next poll reconciles even if the optimistic publish fails
                self.ctx.refresh.request();
                let panel_processor = PanelProcessor {
                    ctx: self.ctx.clone(),
                };
                panel_processor.publish_state(&panel_id, mode).await?;
            }
        }

        Ok(())
    }
}
