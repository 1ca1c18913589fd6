use crate::home_assistant::availability::{Availability, AvailabilityMode};
use crate::home_assistant::device::Device;
use crate::scenario::ArmMode;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AlarmControlPanelDiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub device: Device,
    pub state_topic: String,
    pub command_topic: String,
    pub payload_arm_away: String,
    pub payload_arm_home: String,
    pub payload_arm_night: String,
    pub payload_arm_vacation: String,
    pub payload_disarm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_arm_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_disarm_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Vec<Availability>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_mode: Option<AvailabilityMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_features: Option<Vec<AlarmFeature>>,
}

/// Command payloads Home Assistant publishes on an alarm panel's command
/// topic. These are the platform defaults.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmCommand {
    #[serde(rename = "DISARM")]
    Disarm,
    #[serde(rename = "ARM_AWAY")]
    ArmAway,
    #[serde(rename = "ARM_HOME")]
    ArmHome,
    #[serde(rename = "ARM_NIGHT")]
    ArmNight,
    #[serde(rename = "ARM_VACATION")]
    ArmVacation,
}

impl AlarmCommand {
    pub fn as_payload(&self) -> &'static str {
        match self {
            AlarmCommand::Disarm => "DISARM",
            AlarmCommand::ArmAway => "ARM_AWAY",
            AlarmCommand::ArmHome => "ARM_HOME",
            AlarmCommand::ArmNight => "ARM_NIGHT",
            AlarmCommand::ArmVacation => "ARM_VACATION",
        }
    }

    /// Accepts the bare payload (`ARM_AWAY`) as well as a JSON string
    /// (`"ARM_AWAY"`).
    pub fn from_payload(payload: &str) -> Option<Self> {
        let trimmed = payload.trim().trim_matches('"');
        serde_json::from_value(serde_json::Value::String(trimmed.to_string())).ok()
    }

    pub fn target_mode(&self) -> ArmMode {
        match self {
            AlarmCommand::Disarm => ArmMode::Disarmed,
            AlarmCommand::ArmAway => ArmMode::ArmedAway,
            AlarmCommand::ArmHome => ArmMode::ArmedHome,
            AlarmCommand::ArmNight => ArmMode::ArmedNight,
            AlarmCommand::ArmVacation => ArmMode::ArmedVacation,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmFeature {
    #[serde(rename = "arm_away")]
    ArmAway,
    #[serde(rename = "arm_home")]
    ArmHome,
    #[serde(rename = "arm_night")]
    ArmNight,
    #[serde(rename = "arm_vacation")]
    ArmVacation,
}

impl AlarmFeature {
    /// The feature flag that exposes `mode` in the UI. Disarm is always
    /// available and has no flag.
    pub fn for_mode(mode: ArmMode) -> Option<Self> {
        match mode {
            ArmMode::Disarmed => None,
            ArmMode::ArmedAway => Some(AlarmFeature::ArmAway),
            ArmMode::ArmedHome => Some(AlarmFeature::ArmHome),
            ArmMode::ArmedNight => Some(AlarmFeature::ArmNight),
            ArmMode::ArmedVacation => Some(AlarmFeature::ArmVacation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_quoted_payloads() {
        assert_eq!(
            AlarmCommand::from_payload("ARM_AWAY"),
            Some(AlarmCommand::ArmAway)
        );
        assert_eq!(
            AlarmCommand::from_payload("\"DISARM\"\n"),
            Some(AlarmCommand::Disarm)
        );
        assert_eq!(AlarmCommand::from_payload("arm_away"), None);
        assert_eq!(AlarmCommand::from_payload(""), None);
    }

    #[test]
    fn payload_matches_serde_name() {
        for command in [
            AlarmCommand::Disarm,
            AlarmCommand::ArmAway,
            AlarmCommand::ArmHome,
            AlarmCommand::ArmNight,
            AlarmCommand::ArmVacation,
        ] {
            assert_eq!(AlarmCommand::from_payload(command.as_payload()), Some(command));
        }
    }

    #[test]
    fn features_serialize_as_ha_names() {
        let features: Vec<AlarmFeature> = [ArmMode::Disarmed, ArmMode::ArmedVacation]
            .into_iter()
            .filter_map(AlarmFeature::for_mode)
            .collect();
        assert_eq!(
            serde_json::to_string(&features).unwrap(),
            r#"["arm_vacation"]"#
        );
    }
}
