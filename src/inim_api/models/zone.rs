use crate::inim_api::models::string_or_number;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Zone status reported by the panel when the zone is open or tripped.
pub const ZONE_STATUS_TRIGGERED: i64 = 2;
/// Stands in for a status the panel sent in a shape we cannot read.
pub const ZONE_STATUS_UNREADABLE: i64 = -1;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Zone {
    #[serde(rename = "ZoneId", deserialize_with = "string_or_number")]
    pub zone_id: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Type", default, deserialize_with = "string_or_number")]
    pub r#type: String,
    #[serde(rename = "Status", default, deserialize_with = "lenient_status")]
    pub status: i64,
}

impl Zone {
    pub fn is_triggered(&self) -> bool {
        self.status == ZONE_STATUS_TRIGGERED
    }
}

/// Accepts `2` or `"2"`. Anything else is logged and reads as not triggered.
fn lenient_status<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let status = match &value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    Ok(status.unwrap_or_else(|| {
        warn!("Unreadable zone status {}", value);
        ZONE_STATUS_UNREADABLE
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_may_arrive_as_a_string() {
        let zone: Zone = serde_json::from_str(r#"{"ZoneId":1,"Status":"2"}"#).unwrap();
        assert!(zone.is_triggered());
    }

    #[test]
    fn unreadable_status_is_not_triggered() {
        for status in [r#""open""#, "null", "[2]", "2.5"] {
            let zone: Zone =
                serde_json::from_str(&format!(r#"{{"ZoneId":1,"Status":{}}}"#, status)).unwrap();
            assert_eq!(zone.status, ZONE_STATUS_UNREADABLE, "status {}", status);
            assert!(!zone.is_triggered());
        }
    }
}
