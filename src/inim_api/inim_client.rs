use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::inim_api::models::request::api_request::{
    ActivateScenarioParams, ApiMethod, ApiRequest, DEVICES_EXTENDED_INFO_ALL,
    GetDevicesExtendedParams, REQUEST_POLL_TYPE_FULL, RegisterClientParams, RequestPollParams,
};
use crate::inim_api::models::response::api_response::ApiResponse;
use crate::inim_api::models::response::register_client_response::{
    AuthToken, RegisterClientResponse,
};
use crate::inim_api::models::snapshot::DeviceSnapshot;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

pub const DEFAULT_BASE_URL: &str = "https://api.inimcloud.com";

#[derive(Debug, thiserror::Error)]
pub enum InimApiError {
    #[error("HTTP request to INIM cloud failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unable to encode {0:?} request: {1}")]
    Encode(ApiMethod, #[source] serde_json::Error),

    #[error("Unable to deserialize {method:?} response. Body was: \"{body}\"")]
    Decode {
        method: ApiMethod,
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{method:?} rejected by INIM cloud (status {status}): {message}")]
    Status {
        method: ApiMethod,
        status: i64,
        message: String,
    },

    #[error("{0:?} response carried no data")]
    MissingData(ApiMethod),

    #[error("{0}")]
    Shared(Arc<InimApiError>),
}

#[derive(Clone)]
pub struct InimClient {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
    client_id: String,
    token: Arc<RwLock<Option<AuthToken>>>,
}

impl InimClient {
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        client_id: &str,
        request_timeout: Duration,
    ) -> Result<Self, InimApiError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(request_timeout).build()?,
            base_url: format!("{}/", base_url.trim_end_matches('/')),
            username: username.to_string(),
            password: password.to_string(),
            client_id: client_id.to_string(),
            token: Arc::new(RwLock::new(None)),
        })
    }

    async fn call<P, T>(
        &self,
        method: ApiMethod,
        token: &str,
        params: P,
    ) -> Result<ApiResponse<T>, InimApiError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let request = ApiRequest::new(method, &self.client_id, token, params);
        let encoded =
            serde_json::to_string(&request).map_err(|e| InimApiError::Encode(method, e))?;

        let response = self
            .client
            .get(&self.base_url)
            .query(&[("req", encoded)])
            .send()
            .await?
            .error_for_status()?;
        let contents = response.text().await?;
        trace!("{:?} response: {}", method, contents);

        let parsed: ApiResponse<T> =
            serde_json::from_str(&contents).map_err(|source| InimApiError::Decode {
                method,
                body: contents.clone(),
                source,
            })?;

        if !parsed.is_ok() {
            return Err(InimApiError::Status {
                method,
                status: parsed.status,
                message: parsed.err_msg.unwrap_or_default(),
            });
        }
        Ok(parsed)
    }

    /// Calls `call` with the cached token. A rejected call drops the token so
    /// the next call registers again.
    async fn authenticated_call<P, T>(
        &self,
        method: ApiMethod,
        params: P,
    ) -> Result<ApiResponse<T>, InimApiError>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let token = self.token().await?;
        let result = self.call(method, &token, params).await;
        if let Err(InimApiError::Status { .. }) = &result {
            self.token.write().await.take();
        }
        result
    }

    async fn register_client(&self) -> Result<AuthToken, InimApiError> {
        let issued_at = SystemTime::now();
        let response: ApiResponse<RegisterClientResponse> = self
            .call(
                ApiMethod::RegisterClient,
                "",
                RegisterClientParams::new(&self.username, &self.password, &self.client_id),
            )
            .await?;
        let data = response
            .data
            .ok_or(InimApiError::MissingData(ApiMethod::RegisterClient))?;
        debug!("Registered INIM client, token valid for {}s", data.ttl);
        Ok(AuthToken::from_response(data, issued_at))
    }
}

impl InimApiTrait for InimClient {
    async fn token(&self) -> Result<String, InimApiError> {
        {
            let lock = self.token.read().await;
            if let Some(ref token) = *lock
                && !token.is_expired()
            {
                return Ok(token.token.clone());
            }
        }

        match self.register_client().await {
            Ok(token) => {
                let value = token.token.clone();
                *self.token.write().await = Some(token);
                Ok(value)
            }
            Err(e) => {
                error!("Failed to obtain INIM token: {}", e);
                Err(e)
            }
        }
    }

    async fn request_poll(&self, device_id: &str) -> Result<(), InimApiError> {
        let _: ApiResponse<serde_json::Value> = self
            .authenticated_call(
                ApiMethod::RequestPoll,
                RequestPollParams {
                    device_id: device_id.to_string(),
                    r#type: REQUEST_POLL_TYPE_FULL,
                },
            )
            .await?;
        Ok(())
    }

    async fn get_devices_extended(&self, device_id: &str) -> Result<DeviceSnapshot, InimApiError> {
        let response: ApiResponse<DeviceSnapshot> = self
            .authenticated_call(
                ApiMethod::GetDevicesExtended,
                GetDevicesExtendedParams {
                    info: DEVICES_EXTENDED_INFO_ALL,
                    device_ids: vec![device_id.to_string()],
                },
            )
            .await?;
        response
            .data
            .ok_or(InimApiError::MissingData(ApiMethod::GetDevicesExtended))
    }

    async fn get_devices(&self) -> Result<DeviceSnapshot, InimApiError> {
        let response: ApiResponse<DeviceSnapshot> = self
            .authenticated_call(
                ApiMethod::GetDevicesExtended,
                GetDevicesExtendedParams {
                    info: DEVICES_EXTENDED_INFO_ALL,
                    device_ids: Vec::new(),
                },
            )
            .await?;
        Ok(response.data.unwrap_or_default())
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario: ScenarioCode,
    ) -> Result<(), InimApiError> {
        let _: ApiResponse<serde_json::Value> = self
            .authenticated_call(
                ApiMethod::ActivateScenario,
                ActivateScenarioParams {
                    device_id: device_id.to_string(),
                    scenario_id: scenario,
                },
            )
            .await?;
        Ok(())
    }
}

pub trait InimApiTrait {
    /// Returns a valid token, registering the client when needed.
    fn token(&self) -> impl Future<Output = Result<String, InimApiError>> + Send;
    /// Asks the cloud to refresh its view of the physical panel.
    fn request_poll(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<(), InimApiError>> + Send;
    fn get_devices_extended(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<DeviceSnapshot, InimApiError>> + Send;
    /// Every device visible to the account.
    fn get_devices(&self) -> impl Future<Output = Result<DeviceSnapshot, InimApiError>> + Send;
    fn activate_scenario(
        &self,
        device_id: &str,
        scenario: ScenarioCode,
    ) -> impl Future<Output = Result<(), InimApiError>> + Send;
}

// Implement InimApiTrait for Arc<T> where T: InimApiTrait
impl<T> InimApiTrait for Arc<T>
where
    T: InimApiTrait + Send + Sync,
{
    async fn token(&self) -> Result<String, InimApiError> {
        self.as_ref().token().await
    }

    async fn request_poll(&self, device_id: &str) -> Result<(), InimApiError> {
        self.as_ref().request_poll(device_id).await
    }

    async fn get_devices_extended(&self, device_id: &str) -> Result<DeviceSnapshot, InimApiError> {
        self.as_ref().get_devices_extended(device_id).await
    }

    async fn get_devices(&self) -> Result<DeviceSnapshot, InimApiError> {
        self.as_ref().get_devices().await
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario: ScenarioCode,
    ) -> Result<(), InimApiError> {
        self.as_ref().activate_scenario(device_id, scenario).await
    }
}
