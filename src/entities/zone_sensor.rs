use crate::entities::StateSource;
use crate::home_assistant::topics;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::inim_api::models::zone::Zone;

/// True when the zone is tripped. A device or zone missing from the snapshot
/// reads as not tripped.
pub fn zone_is_on(snapshot: &DeviceSnapshot, device_id: &str, zone_id: &str) -> bool {
    snapshot
        .device(device_id)
        .and_then(|device| device.zone(zone_id))
        .is_some_and(Zone::is_triggered)
}

/// Presence sensor backed by one INIM zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneSensor {
    pub device_id: String,
    pub zone_id: String,
    pub name: String,
    pub zone_type: String,
    unique_id: String,
}

impl ZoneSensor {
    pub fn from_zone(device_id: &str, zone: &Zone) -> Self {
        let name = if zone.name.trim().is_empty() {
            format!("Zone {}", zone.zone_id)
        } else {
            zone.name.clone()
        };
        Self {
            device_id: device_id.to_string(),
            zone_id: zone.zone_id.clone(),
            name,
            zone_type: zone.r#type.clone(),
            unique_id: topics::zone_unique_id(device_id, &zone.zone_id),
        }
    }
}

impl StateSource for ZoneSensor {
    type State = bool;

    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn update(&mut self, snapshot: &DeviceSnapshot) -> Option<bool> {
        Some(zone_is_on(snapshot, &self.device_id, &self.zone_id))
    }
}
