use crate::inim_api::inim_client::{InimApiError, InimApiTrait};
use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use moka::future::Cache;
use std::time::Duration;

/// Caches the account's device list, which only feeds names and models into
/// Home Assistant's device registry. Polls and commands always go straight
/// through.
#[derive(Clone)]
pub struct CachedInimClient<T>
where
    T: InimApiTrait,
{
    client: T,
    devices_cache: Cache<&'static str, DeviceSnapshot>,
}

impl<T> CachedInimClient<T>
where
    T: InimApiTrait,
{
    pub fn new(client: T) -> Self {
        Self {
            client,
            devices_cache: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .build(),
        }
    }
}

impl<T> InimApiTrait for CachedInimClient<T>
where
    T: InimApiTrait + Send + Sync,
{
    async fn token(&self) -> Result<String, InimApiError> {
        self.client.token().await
    }

    async fn request_poll(&self, device_id: &str) -> Result<(), InimApiError> {
        self.client.request_poll(device_id).await
    }

    async fn get_devices_extended(&self, device_id: &str) -> Result<DeviceSnapshot, InimApiError> {
        // never cached, every poll must reach the panel
        self.client.get_devices_extended(device_id).await
    }

    async fn get_devices(&self) -> Result<DeviceSnapshot, InimApiError> {
        self.devices_cache
            .try_get_with("devices", async { self.client.get_devices().await })
            .await
            .map_err(InimApiError::Shared)
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario: ScenarioCode,
    ) -> Result<(), InimApiError> {
        self.client.activate_scenario(device_id, scenario).await
    }
}
