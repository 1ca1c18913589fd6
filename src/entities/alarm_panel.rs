use crate::config::PanelConfig;
use crate::entities::{CommandSink, DispatchError, StateSource};
use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::scenario::ArmMode;
use tracing::{debug, warn};

/// An alarm control panel whose state is inferred from the scenarios active
/// on one INIM device.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmPanel {
    pub config: PanelConfig,
    pub device_id: String,
    /// What Home Assistant currently shows. `None` until a scenario matched.
    pub(crate) displayed: Option<ArmMode>,
}

impl AlarmPanel {
    pub fn new(device_id: &str, config: PanelConfig) -> Self {
        Self {
            config,
            device_id: device_id.to_string(),
            displayed: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Arm mode implied by `snapshot`, or `None` when the device is missing
    /// or none of the configured scenarios is active.
    pub fn resolve_state(&self, snapshot: &DeviceSnapshot) -> Option<ArmMode> {
        let Some(device) = snapshot.device(&self.device_id) else {
            warn!(
                "Device {} not found in snapshot for panel {}",
                self.device_id, self.config.name
            );
            return None;
        };
        let resolved = self.config.scenarios.resolve(&device.active_scenarios);
        if resolved.is_none() {
            if device.active_scenarios.is_empty() {
                debug!("Device {} reports no active scenario", self.device_id);
            } else {
                debug!(
                    "No configured scenario active for panel {} (active: {:?})",
                    self.config.name, device.active_scenarios
                );
            }
        }
        resolved
    }
}

impl StateSource for AlarmPanel {
    type State = ArmMode;

    fn unique_id(&self) -> &str {
        &self.config.unique_id
    }

    /// An unmatched snapshot keeps the previous state on screen.
    fn update(&mut self, snapshot: &DeviceSnapshot) -> Option<ArmMode> {
        if let Some(mode) = self.resolve_state(snapshot) {
            self.displayed = Some(mode);
        }
        self.displayed
    }
}

impl CommandSink for AlarmPanel {
    type Command = ArmMode;

    fn scenario_for(&self, mode: ArmMode) -> Result<ScenarioCode, DispatchError> {
        self.config
            .scenarios
            .code_for(mode)
            .ok_or_else(|| DispatchError::NoScenarioConfigured {
                panel: self.config.name.clone(),
                mode,
            })
    }

    fn acknowledge(&mut self, mode: ArmMode) {
        self.displayed = Some(mode);
    }
}
