use crate::inim_api::models::active_scenarios::ScenarioCode;
use serde::Serialize;

/// Application name the INIM mobile apps send with every request.
pub const APPLICATION_NAME: &str = "it.inim.inimutenti";

/// Envelope for every INIM cloud call. It is sent JSON encoded in the `req`
/// query parameter.
#[derive(Serialize, Debug)]
pub struct ApiRequest<P: Serialize> {
    #[serde(rename = "Node")]
    pub node: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ClientIP")]
    pub client_ip: String,
    #[serde(rename = "Method")]
    pub method: ApiMethod,
    #[serde(rename = "ClientId")]
    pub client_id: String,
    #[serde(rename = "Token")]
    pub token: String,
    #[serde(rename = "Params")]
    pub params: P,
}

impl<P: Serialize> ApiRequest<P> {
    pub fn new(method: ApiMethod, client_id: &str, token: &str, params: P) -> Self {
        Self {
            node: String::new(),
            name: APPLICATION_NAME.to_string(),
            client_ip: String::new(),
            method,
            client_id: client_id.to_string(),
            token: token.to_string(),
            params,
        }
    }
}

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
pub enum ApiMethod {
    RegisterClient,
    RequestPoll,
    GetDevicesExtended,
    ActivateScenario,
}

#[derive(Serialize, Debug)]
pub struct RegisterClientParams {
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "ClientId")]
    pub client_id: String,
    #[serde(rename = "ClientName")]
    pub client_name: String,
    #[serde(rename = "ClientInfo")]
    pub client_info: String,
    #[serde(rename = "Role")]
    pub role: String,
    #[serde(rename = "Brand")]
    pub brand: String,
}

impl RegisterClientParams {
    pub fn new(username: &str, password: &str, client_id: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            client_id: client_id.to_string(),
            client_name: "inim-mqtt-bridge".to_string(),
            client_info: format!(
                "{{\"name\":\"inim-mqtt-bridge\",\"version\":\"{}\"}}",
                env!("CARGO_PKG_VERSION")
            ),
            role: "1".to_string(),
            brand: "0".to_string(),
        }
    }
}

/// Poll type asking the cloud to refresh its view of the whole panel.
pub const REQUEST_POLL_TYPE_FULL: i64 = 5;

#[derive(Serialize, Debug)]
pub struct RequestPollParams {
    #[serde(rename = "DeviceId")]
    pub device_id: String,
    #[serde(rename = "Type")]
    pub r#type: i64,
}

/// Bit mask selecting every section of the extended device data.
pub const DEVICES_EXTENDED_INFO_ALL: i64 = 16_908_287;

#[derive(Serialize, Debug)]
pub struct GetDevicesExtendedParams {
    #[serde(rename = "Info")]
    pub info: i64,
    #[serde(rename = "DeviceIds", skip_serializing_if = "Vec::is_empty")]
    pub device_ids: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct ActivateScenarioParams {
    #[serde(rename = "DeviceId")]
    pub device_id: String,
    #[serde(rename = "ScenarioId")]
    pub scenario_id: ScenarioCode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_vendor_field_names() {
        let request = ApiRequest::new(
            ApiMethod::ActivateScenario,
            "client",
            "tok",
            ActivateScenarioParams {
                device_id: "42".to_string(),
                scenario_id: 3,
            },
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["Method"], "ActivateScenario");
        assert_eq!(value["Name"], APPLICATION_NAME);
        assert_eq!(value["Token"], "tok");
        assert_eq!(value["Params"]["DeviceId"], "42");
        assert_eq!(value["Params"]["ScenarioId"], 3);
    }

    #[test]
    fn device_list_request_omits_empty_ids() {
        let params = GetDevicesExtendedParams {
            info: DEVICES_EXTENDED_INFO_ALL,
            device_ids: Vec::new(),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert!(value.get("DeviceIds").is_none());
    }
}
