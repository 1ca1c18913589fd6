use crate::inim_api::inim_client::{InimApiError, InimApiTrait};
use crate::inim_api::models::active_scenarios::ScenarioCode;
use crate::inim_api::models::request::api_request::ApiMethod;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// In-memory INIM cloud that records every call.
#[derive(Default)]
pub struct FakeInimApi {
    calls: Mutex<Vec<String>>,
    snapshot: Mutex<DeviceSnapshot>,
    fail_auth: AtomicBool,
    fail_polls: AtomicBool,
    fail_activate: AtomicBool,
}

impl FakeInimApi {
    pub fn with_snapshot(snapshot: DeviceSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Self {
        Self::with_snapshot(serde_json::from_str(json).unwrap())
    }

    pub fn fail_auth(&self, fail: bool) {
        self.fail_auth.store(fail, Ordering::SeqCst);
    }

    pub fn fail_polls(&self, fail: bool) {
        self.fail_polls.store(fail, Ordering::SeqCst);
    }

    pub fn fail_activate(&self, fail: bool) {
        self.fail_activate.store(fail, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().await.push(call);
    }

    fn rejected(method: ApiMethod) -> InimApiError {
        InimApiError::Status {
            method,
            status: 1,
            message: "rejected by fake".to_string(),
        }
    }
}

impl InimApiTrait for FakeInimApi {
    async fn token(&self) -> Result<String, InimApiError> {
        self.record("token".to_string()).await;
        if self.fail_auth.load(Ordering::SeqCst) {
            return Err(Self::rejected(ApiMethod::RegisterClient));
        }
        Ok("fake-token".to_string())
    }

    async fn request_poll(&self, device_id: &str) -> Result<(), InimApiError> {
        self.record(format!("request_poll:{}", device_id)).await;
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(Self::rejected(ApiMethod::RequestPoll));
        }
        Ok(())
    }

    async fn get_devices_extended(&self, device_id: &str) -> Result<DeviceSnapshot, InimApiError> {
        self.record(format!("get_devices_extended:{}", device_id))
            .await;
        if self.fail_polls.load(Ordering::SeqCst) {
            return Err(Self::rejected(ApiMethod::GetDevicesExtended));
        }
        Ok(self.snapshot.lock().await.clone())
    }

    async fn get_devices(&self) -> Result<DeviceSnapshot, InimApiError> {
        self.record("get_devices".to_string()).await;
        Ok(self.snapshot.lock().await.clone())
    }

    async fn activate_scenario(
        &self,
        device_id: &str,
        scenario: ScenarioCode,
    ) -> Result<(), InimApiError> {
        self.record(format!("activate_scenario:{}:{}", device_id, scenario))
            .await;
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(Self::rejected(ApiMethod::ActivateScenario));
        }
        Ok(())
    }
}
