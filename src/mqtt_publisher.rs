use rumqttc::{AsyncClient, ClientError, QoS};

/// The slice of the Home Assistant broker connection the processors need.
pub trait HaPublisher: Clone + Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: String,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), ClientError>> + Send;
}

impl HaPublisher for AsyncClient {
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: String,
    ) -> Result<(), ClientError> {
        AsyncClient::publish(self, topic, qos, retain, payload).await
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ClientError> {
        AsyncClient::subscribe(self, topic, QoS::AtLeastOnce).await
    }
}

/// Publisher that keeps everything in memory for assertions.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub struct RecordingPublisher {
    published: std::sync::Arc<std::sync::Mutex<Vec<(String, String, bool)>>>,
    subscriptions: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
    failing: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

#[cfg(test)]
impl RecordingPublisher {
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Makes the next publish to `topic` fail as if the client queue were gone.
    pub fn fail_next_publish(&self, topic: &str) {
        self.failing.lock().unwrap().push(topic.to_string());
    }

    /// Payloads sent to `topic`, oldest first.
    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload)
            .collect()
    }
}

#[cfg(test)]
impl HaPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: String,
    ) -> Result<(), ClientError> {
        {
            let mut failing = self.failing.lock().unwrap();
            if let Some(index) = failing.iter().position(|t| t == topic) {
                failing.remove(index);
                return Err(ClientError::Request(rumqttc::Request::Publish(
                    rumqttc::Publish::new(topic, qos, payload),
                )));
            }
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload, retain));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ClientError> {
        self.subscriptions.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}
