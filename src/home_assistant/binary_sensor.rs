use crate::home_assistant::availability::{Availability, AvailabilityMode};
use crate::home_assistant::device::Device;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BinarySensorDiscoveryPayload {
    pub device: Device,
    pub device_class: String,
    pub name: String,
    pub payload_off: String,
    pub payload_on: String,
    pub state_topic: String,
    pub unique_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_attributes_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability: Option<Vec<Availability>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub availability_mode: Option<AvailabilityMode>,
}

/// INIM zone types that line up with a Home Assistant device class. Anything
/// else is exposed as a presence sensor.
pub fn device_class_for(zone_type: &str) -> &'static str {
    match zone_type.to_ascii_lowercase().as_str() {
        "door" => "door",
        "window" => "window",
        "motion" | "pir" => "motion",
        "smoke" | "fire" => "smoke",
        "gas" => "gas",
        "flood" | "water" => "moisture",
        "tamper" => "tamper",
        _ => "presence",
    }
}
