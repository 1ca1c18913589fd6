use crate::inim_api::models::active_scenarios::{ActiveScenarios, ScenarioCode};
use crate::inim_api::models::zone::Zone;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "RawDevice")]
pub struct Device {
    pub name: String,
    pub model: Option<String>,
    pub zones: Vec<Zone>,
    pub active_scenarios: ActiveScenarios,
}

impl Device {
    pub fn zone(&self, zone_id: &str) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.zone_id == zone_id)
    }
}

/// Wire shape of a device entry in `GetDevicesExtended`.
#[derive(Deserialize)]
struct RawDevice {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "ModelFamily", default)]
    model: Option<String>,
    #[serde(rename = "Zones", default)]
    zones: Vec<Zone>,
    #[serde(rename = "ActiveScenario", default)]
    active_scenario: Option<Value>,
    #[serde(rename = "ActiveScenarios", default)]
    active_scenarios: Option<Value>,
}

fn scenario_code(value: &Value) -> Option<ScenarioCode> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// `ActiveScenarios` as a delimited string, a list or a bare number.
fn scenario_list(value: &Value) -> ActiveScenarios {
    match value {
        Value::String(list) => ActiveScenarios::parse_delimited(list),
        Value::Number(_) => match scenario_code(value) {
            Some(code) => ActiveScenarios::Multi(vec![code]),
            None => unreadable("ActiveScenarios", value),
        },
        Value::Array(items) => ActiveScenarios::Multi(
            items
                .iter()
                .filter_map(|item| {
                    let code = scenario_code(item);
                    if code.is_none() {
                        warn!("Ignoring malformed scenario code {}", item);
                    }
                    code
                })
                .collect(),
        ),
        _ => unreadable("ActiveScenarios", value),
    }
}

fn single_scenario(value: &Value) -> ActiveScenarios {
    match scenario_code(value) {
        Some(code) => ActiveScenarios::Single(code),
        None => unreadable("ActiveScenario", value),
    }
}

fn unreadable(field: &str, value: &Value) -> ActiveScenarios {
    warn!("Unreadable {} {}, treating as no active scenario", field, value);
    ActiveScenarios::default()
}

impl From<RawDevice> for Device {
    fn from(raw: RawDevice) -> Self {
        let active_scenarios = match (raw.active_scenarios, raw.active_scenario) {
            (Some(list), _) if !list.is_null() => scenario_list(&list),
            (_, Some(single)) if !single.is_null() => single_scenario(&single),
            _ => ActiveScenarios::default(),
        };
        Self {
            name: raw.name,
            model: raw.model,
            zones: raw.zones,
            active_scenarios,
        }
    }
}
