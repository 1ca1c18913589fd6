use crate::config::{Config, PanelConfig};
use crate::coordinator::{PollState, RefreshHandle};
use tokio::sync::watch;

/// Everything one configured INIM device needs at runtime, handed to each
/// task explicitly.
#[derive(Clone)]
pub struct EntryContext<T, P> {
    pub client: T,
    pub ha_client: P,
    pub device_id: String,
    pub discovery_prefix: String,
    pub panels: Vec<PanelConfig>,
    pub poll_state: watch::Receiver<PollState>,
    pub refresh: RefreshHandle,
}

impl<T, P> EntryContext<T, P> {
    pub fn new(
        config: &Config,
        client: T,
        ha_client: P,
        poll_state: watch::Receiver<PollState>,
        refresh: RefreshHandle,
    ) -> Self {
        Self {
            client,
            ha_client,
            device_id: config.inim.device_id.clone(),
            discovery_prefix: config.home_assistant.discovery_prefix.clone(),
            panels: config.panels.clone(),
            poll_state,
            refresh,
        }
    }
}
