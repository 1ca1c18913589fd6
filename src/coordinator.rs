use crate::inim_api::inim_client::{InimApiError, InimApiTrait};
use crate::inim_api::models::snapshot::DeviceSnapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("device {device_id} is not ready")]
    NotReady {
        device_id: String,
        #[source]
        source: InimApiError,
    },
}

/// What readers of the coordinator see after each poll.
#[derive(Debug, Clone, Default)]
pub struct PollState {
    /// Last snapshot that was fetched successfully. Kept across failed polls.
    pub snapshot: Option<Arc<DeviceSnapshot>>,
    pub last_update_success: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Asks the cloud to poll the panel, then reads back the fresh data.
pub async fn fetch_snapshot<T: InimApiTrait>(
    client: &T,
    device_id: &str,
) -> Result<DeviceSnapshot, InimApiError> {
    client.request_poll(device_id).await?;
    client.get_devices_extended(device_id).await
}

/// Cloneable handle used to ask for a poll ahead of schedule.
#[derive(Clone, Debug, Default)]
pub struct RefreshHandle(Arc<Notify>);

impl RefreshHandle {
    /// Requests made while a poll is pending collapse into one.
    pub fn request(&self) {
        self.0.notify_one();
    }

    /// Resolves once a refresh has been requested.
    pub async fn notified(&self) {
        self.0.notified().await
    }
}

pub struct PollCoordinator<T> {
    client: T,
    device_id: String,
    scan_interval: Duration,
    state: watch::Sender<PollState>,
    refresh: RefreshHandle,
}

impl<T> PollCoordinator<T>
where
    T: InimApiTrait + Send + Sync,
{
    pub fn new(client: T, device_id: &str, scan_interval: Duration) -> Self {
        let (state, _) = watch::channel(PollState::default());
        Self {
            client,
            device_id: device_id.to_string(),
            scan_interval,
            state,
            refresh: RefreshHandle::default(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        self.refresh.clone()
    }

    /// Polls once and broadcasts the outcome. A failure keeps the previous
    /// snapshot but marks the device unavailable.
    pub async fn refresh(&self) -> Result<Arc<DeviceSnapshot>, InimApiError> {
        match fetch_snapshot(&self.client, &self.device_id).await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                self.state.send_modify(|state| {
                    state.snapshot = Some(snapshot.clone());
                    state.last_update_success = true;
                    state.last_updated = Some(Utc::now());
                });
                debug!("Polled device {}", self.device_id);
                Ok(snapshot)
            }
            Err(e) => {
                self.state.send_modify(|state| state.last_update_success = false);
                Err(e)
            }
        }
    }

    /// The first poll of an entry. Failing here means setup must be retried
    /// later rather than starting with no data.
    pub async fn first_refresh(&self) -> Result<Arc<DeviceSnapshot>, CoordinatorError> {
        let snapshot = self
            .refresh()
            .await
            .map_err(|source| CoordinatorError::NotReady {
                device_id: self.device_id.clone(),
                source,
            })?;
        info!(
            "First poll of device {} returned {} device(s)",
            self.device_id,
            snapshot.devices.len()
        );
        Ok(snapshot)
    }

    /// Polls every scan interval, or sooner when a refresh is requested.
    /// The first tick is one interval out, after `first_refresh`.
    pub async fn run(&self) {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.scan_interval, self.scan_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.refresh.notified() => {
                    debug!("Refresh requested for device {}", self.device_id);
                    ticker.reset();
                }
            }
            if let Err(e) = self.refresh().await {
                error!("Polling device {} failed: {:?}", self.device_id, e);
            }
        }
    }
}
