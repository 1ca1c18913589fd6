pub const TOPIC_ROOT: &str = "inim";

pub fn availability(device_id: &str) -> String {
    format!("{}/device/{}/availability", TOPIC_ROOT, device_id)
}

pub fn panel_discovery(discovery_prefix: &str, panel_id: &str) -> String {
    format!("{}/alarm_control_panel/{}/config", discovery_prefix, panel_id)
}

pub fn panel_state(device_id: &str, panel_id: &str) -> String {
    format!("{}/device/{}/panel/{}/state", TOPIC_ROOT, device_id, panel_id)
}

pub fn panel_command(device_id: &str, panel_id: &str) -> String {
    format!("{}/device/{}/panel/{}/set", TOPIC_ROOT, device_id, panel_id)
}

pub fn panel_attributes(device_id: &str, panel_id: &str) -> String {
    format!("{}/device/{}/panel/{}/attributes", TOPIC_ROOT, device_id, panel_id)
}

/// Escapes an id for use as one topic level and inside a discovery object id.
/// ASCII letters, digits and `-` pass through; every other byte becomes `_`
/// plus two hex digits, so distinct ids never collide.
pub fn topic_safe(id: &str) -> String {
    let mut escaped = String::with_capacity(id.len());
    for byte in id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("_{:02x}", byte));
        }
    }
    escaped
}

pub fn zone_unique_id(device_id: &str, zone_id: &str) -> String {
    format!("{}_{}_zone_{}", TOPIC_ROOT, device_id, topic_safe(zone_id))
}

pub fn zone_discovery(discovery_prefix: &str, zone_unique_id: &str) -> String {
    format!("{}/binary_sensor/{}/config", discovery_prefix, zone_unique_id)
}

pub fn zone_state(device_id: &str, zone_id: &str) -> String {
    format!(
        "{}/device/{}/zone/{}/state",
        TOPIC_ROOT,
        device_id,
        topic_safe(zone_id)
    )
}

pub fn zone_attributes(device_id: &str, zone_id: &str) -> String {
    format!(
        "{}/device/{}/zone/{}/attributes",
        TOPIC_ROOT,
        device_id,
        topic_safe(zone_id)
    )
}
