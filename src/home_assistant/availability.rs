use serde::{Deserialize, Serialize};

/// Represents an availability configuration for a Home Assistant entity.
///
/// Home Assistant watches `topic` and marks the entity unavailable whenever
/// the last payload equals `payload_not_available`.
///
/// # Fields
///
/// * `payload_available` *(Option<String>)*:
///   The payload that represents the available state.
///
/// * `payload_not_available` *(Option<String>)*:
///   The payload that represents the unavailable state.
///
/// * `topic` *(String)*:
///   An MQTT topic subscribed to receive availability (online/offline) updates.
///
/// * `value_template` *(Option<String>)*:
///   Defines a template to extract device’s availability from the topic.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Availability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_available: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_not_available: Option<String>,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_template: Option<String>,
}

impl Availability {
    pub fn online_offline(topic: &str) -> Self {
        Self {
            payload_available: Some(AvailabilityState::Online.as_str().to_string()),
            payload_not_available: Some(AvailabilityState::Offline.as_str().to_string()),
            topic: topic.to_string(),
            value_template: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum AvailabilityMode {
    #[serde(rename = "all")]
    All,
    #[serde(rename = "any")]
    Any,
    #[serde(rename = "latest")]
    Latest,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityState {
    #[serde(rename = "online")]
    Online,
    #[serde(rename = "offline")]
    Offline,
}

impl AvailabilityState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityState::Online => "online",
            AvailabilityState::Offline => "offline",
        }
    }
}
