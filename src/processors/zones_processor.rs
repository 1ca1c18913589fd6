use crate::context::EntryContext;
use crate::entities::StateSource;
use crate::entities::zone_sensor::ZoneSensor;
use crate::home_assistant::availability::Availability;
use crate::home_assistant::binary_sensor::{BinarySensorDiscoveryPayload, device_class_for};
use crate::home_assistant::device::Device;
use crate::home_assistant::topics;
use crate::inim_api::models::snapshot::DeviceSnapshot;
use crate::mqtt_publisher::HaPublisher;
use crate::processors::{ProcessorState, SnapshotProcessor};
use rumqttc::QoS;
use serde_json::json;
use std::sync::Arc;
use tokio::join;
use tokio::sync::RwLock;
use tracing::{error, info, trace};

const STATE_ON: &str = "on";
const STATE_OFF: &str = "off";

#[derive(Clone)]
pub struct ZonesProcessor<T, P> {
    pub ctx: EntryContext<T, P>,
}

impl<T, P> ZonesProcessor<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    pub fn discovery_payload(
        &self,
        sensor: &ZoneSensor,
        device: &Device,
    ) -> BinarySensorDiscoveryPayload {
        let device_id = &self.ctx.device_id;
        BinarySensorDiscoveryPayload {
            device: device.clone(),
            device_class: device_class_for(&sensor.zone_type).to_string(),
            name: sensor.name.clone(),
            payload_off: STATE_OFF.to_string(),
            payload_on: STATE_ON.to_string(),
            state_topic: topics::zone_state(device_id, &sensor.zone_id),
            unique_id: sensor.unique_id().to_string(),
            json_attributes_topic: Some(topics::zone_attributes(device_id, &sensor.zone_id)),
            availability: Some(vec![Availability::online_offline(&topics::availability(
                device_id,
            ))]),
            availability_mode: None, //defaults to "latest"
        }
    }

    pub async fn handle_binary_sensor(
        &self,
        sensor: &ZoneSensor,
        is_on: bool,
        status: Option<i64>,
        device: &Device,
        should_publish: bool,
    ) -> anyhow::Result<()> {
        let device_id = &self.ctx.device_id;
        let state_topic = topics::zone_state(device_id, &sensor.zone_id);

        if should_publish {
            let discovery_payload = serde_json::to_string(&self.discovery_payload(sensor, device))?;
            trace!("{}", discovery_payload);
            self.ctx
                .ha_client
                .publish(
                    &topics::zone_discovery(&self.ctx.discovery_prefix, sensor.unique_id()),
                    QoS::AtLeastOnce,
                    true,
                    discovery_payload,
                )
                .await?;
        }

        let attributes_topic = topics::zone_attributes(device_id, &sensor.zone_id);
        let attributes = json!({
            "zone_id": sensor.zone_id,
            "zone_type": sensor.zone_type,
            "status": status,
        });
        match join!(
            self.ctx.ha_client.publish(
                &state_topic,
                QoS::AtMostOnce,
                true,
                if is_on { STATE_ON } else { STATE_OFF }.to_string(),
            ),
            self.ctx.ha_client.publish(
                &attributes_topic,
                QoS::AtMostOnce,
                false,
                attributes.to_string(),
            )
        ) {
            (Err(e), _) | (_, Err(e)) => {
                error!("Error publishing to {}: {:?}", state_topic, e);
                Err(anyhow::Error::from(e))
            }
            _ => Ok(()),
        }
    }
}

impl<T, P> SnapshotProcessor for ZonesProcessor<T, P>
where
    T: Clone + Send + Sync + 'static,
    P: HaPublisher,
{
    async fn handle(
        &self,
        snapshot: Arc<DeviceSnapshot>,
        processor_state: Arc<RwLock<ProcessorState>>,
    ) -> anyhow::Result<()> {
        let device_id = &self.ctx.device_id;
        let zones = snapshot
            .device(device_id)
            .map(|device| device.zones.as_slice())
            .unwrap_or_default();

        let (device, published_discovery, updates) = {
            let mut state = processor_state.write().await;
            for zone in zones {
                if !state.zones.iter().any(|s| s.zone_id == zone.zone_id) {
                    info!("New zone {} ({}) on device {}", zone.zone_id, zone.name, device_id);
                    state.zones.push(ZoneSensor::from_zone(device_id, zone));
                }
            }
            let updates: Vec<(ZoneSensor, bool)> = state
                .zones
                .iter_mut()
                .map(|sensor| {
                    let is_on = sensor.update(&snapshot).unwrap_or(false);
                    (sensor.clone(), is_on)
                })
                .collect();
            (
                state.device.clone(),
                state.published_discovery.clone(),
                updates,
            )
        };

        for (sensor, is_on) in updates {
            trace!("{:?}", &sensor);
            let status = zones
                .iter()
                .find(|zone| zone.zone_id == sensor.zone_id)
                .map(|zone| zone.status);
            // Marked per sensor, so a failure leaves later zones unmarked
            let should_publish = published_discovery.insert(sensor.unique_id().to_string());
            if let Err(e) = self
                .handle_binary_sensor(&sensor, is_on, status, &device, should_publish)
                .await
            {
                if should_publish {
                    published_discovery.remove(sensor.unique_id());
                }
                error!("Error processing zone {}: {:?}", sensor.unique_id(), e);
                return Err(e);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inim_api::test_support::FakeInimApi;
    use crate::processors::test_support::{
        DEVICE_JSON, context, default_panels, snapshot, state,
    };

    #[tokio::test]
    async fn publishes_zone_states() {
        let ctx = context(Arc::new(FakeInimApi::default()), default_panels());
        let snapshot = snapshot(DEVICE_JSON);
        let processor_state = state(&ctx, &snapshot);
        let processor = ZonesProcessor { ctx: ctx.clone() };

        processor.handle(snapshot, processor_state).await.unwrap();

        let publisher = &ctx.ha_client;
        assert_eq!(publisher.payloads_for("inim/device/dev/zone/1/state"), vec!["on"]);
        assert_eq!(publisher.payloads_for("inim/device/dev/zone/2/state"), vec!["off"]);

        let discovery = publisher.payloads_for("homeassistant/binary_sensor/inim_dev_zone_1/config");
        assert_eq!(discovery.len(), 1);
        let discovery: serde_json::Value = serde_json::from_str(&discovery[0]).unwrap();
        assert_eq!(discovery["device_class"], "door");
        assert_eq!(discovery["name"], "Porta");
    }

    #[tokio::test]
    async fn zone_missing_from_later_snapshot_reads_off() {
        let ctx = context(Arc::new(FakeInimApi::default()), default_panels());
        let first = snapshot(DEVICE_JSON);
        let processor_state = state(&ctx, &first);
        let processor = ZonesProcessor { ctx: ctx.clone() };

        processor
            .handle(first, processor_state.clone())
            .await
            .unwrap();
        processor
            .handle(snapshot(r#"{"dev":{"Zones":[]}}"#), processor_state)
            .await
            .unwrap();

        assert_eq!(
            ctx.ha_client.payloads_for("inim/device/dev/zone/1/state"),
            vec!["on", "off"]
        );
    }

    #[tokio::test]
    async fn failed_discovery_leaves_later_zones_undiscovered_for_retry() {
        let ctx = context(Arc::new(FakeInimApi::default()), default_panels());
        let snapshot = snapshot(DEVICE_JSON);
        let processor_state = state(&ctx, &snapshot);
        let processor = ZonesProcessor { ctx: ctx.clone() };
        let zone_1 = "homeassistant/binary_sensor/inim_dev_zone_1/config";
        let zone_2 = "homeassistant/binary_sensor/inim_dev_zone_2/config";
        ctx.ha_client.fail_next_publish(zone_1);

        assert!(
            processor
                .handle(snapshot.clone(), processor_state.clone())
                .await
                .is_err()
        );
        {
            let state = processor_state.read().await;
            assert!(!state.published_discovery.contains("inim_dev_zone_1"));
            assert!(!state.published_discovery.contains("inim_dev_zone_2"));
        }

        processor.handle(snapshot, processor_state).await.unwrap();

        assert_eq!(ctx.ha_client.payloads_for(zone_1).len(), 1);
        assert_eq!(ctx.ha_client.payloads_for(zone_2).len(), 1);
    }

    #[tokio::test]
    async fn zones_appearing_later_get_discovered() {
        let ctx = context(Arc::new(FakeInimApi::default()), default_panels());
        let first = snapshot(r#"{"dev":{"Zones":[]}}"#);
        let processor_state = state(&ctx, &first);
        let processor = ZonesProcessor { ctx: ctx.clone() };

        processor
            .handle(
                snapshot(r#"{"dev":{"Zones":[{"ZoneId":"9","Name":"Box","Status":2}]}}"#),
                processor_state.clone(),
            )
            .await
            .unwrap();

        assert_eq!(processor_state.read().await.zones.len(), 1);
        assert_eq!(
            ctx.ha_client
                .payloads_for("homeassistant/binary_sensor/inim_dev_zone_9/config")
                .len(),
            1
        );
    }
}
