use crate::inim_api::models::device::Device;
use serde::Deserialize;
use std::collections::HashMap;

/// One poll's worth of device state, keyed by INIM device id.
///
/// Snapshots are never patched in place; each poll replaces the previous one.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct DeviceSnapshot {
    pub devices: HashMap<String, Device>,
}

impl DeviceSnapshot {
    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.get(device_id)
    }
}
