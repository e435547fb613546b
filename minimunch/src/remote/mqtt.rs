use super::*;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, QoS};
use std::{
    collections::HashMap,
    sync::Weak,
    time::Duration,
};
use tokio::task::JoinHandle;

/// Record store carried over MQTT.
///
/// The document at `path` is the retained JSON payload on
/// `<base_topic>/<path>`. Partial writes go to `<base_topic>/<path>/set`
/// and are merged by the device that owns the record.
///
/// Unlike the in-memory store, a subscription on a topic with no retained
/// document receives nothing until the device first publishes. The broker
/// gives no signal that tells "no retained message" apart from "not yet
/// delivered", and an absent snapshot leaves the mirror untouched anyway.
#[derive(Clone, Deref)]
pub struct MqttStore(Arc<MqttStoreData>);

pub struct MqttStoreData {
    base_topic: String,
    client_id:  String,
    client:     AsyncClient,
    topics:     Mutex<Topics>,
    driver:     Mutex<Option<JoinHandle<()>>>,
}

#[derive(Default)]
struct Topics {
    next_id: u64,
    routes:  HashMap<String, Route>,
}

#[derive(Default)]
struct Route {
    subscribers: HashMap<u64, mpsc::UnboundedSender<RemoteEvent>>,
    last:        Option<RemoteEvent>,
}

impl fmt::Debug for MqttStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttStore")
            .field("client_id", &self.client_id)
            .field("base_topic", &self.base_topic)
            .finish()
    }
}

impl MqttStore {
    pub fn new(config: &MqttConfiguration) -> Result<Self> {
        let (store, eventloop) = Self::with_eventloop(config);
        let driver = tokio::spawn(drive(
            Arc::downgrade(&store.0),
            eventloop,
            Duration::from_secs(config.reconnect_secs),
        ));
        *store.driver.lock() = Some(driver);
        info!(
            "Connecting to MQTT broker at {}:{} as {}",
            config.host, config.port, store.client_id
        );
        Ok(store)
    }

    /// Store whose event loop is handed back to the caller instead of
    /// being driven.
    fn with_eventloop(config: &MqttConfiguration) -> (Self, EventLoop) {
        let client_id = format!("{}-{}", config.client_id, random_suffix(8));
        let mut mqtt_options = MqttOptions::new(client_id.clone(), config.host.clone(), config.port);
        mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        let (client, eventloop) = AsyncClient::new(mqtt_options, 64);

        let store = MqttStore(Arc::new(MqttStoreData {
            base_topic: config.base_topic.trim_end_matches('/').into(),
            client_id,
            client,
            topics: Default::default(),
            driver: Mutex::new(None),
        }));
        (store, eventloop)
    }

    fn topic(&self, path: &str) -> String {
        format!("{}/{}", self.base_topic, segments(path).collect::<Vec<_>>().join("/"))
    }

    fn route(&self, topic: &str, payload: &[u8]) {
        let event = match decode(payload) {
            Ok(snapshot) => RemoteEvent::Snapshot(snapshot),
            Err(e) => {
                warn!("Ignoring malformed document on '{}': {}", topic, e);
                return;
            }
        };
        trace!("Document received on {}", topic);
        let mut topics = self.topics.lock();
        if let Some(route) = topics.routes.get_mut(topic) {
            route
                .subscribers
                .retain(|_, tx| tx.send(event.clone()).is_ok());
            route.last = Some(event);
        }
    }

    fn broadcast(&self, event: RemoteEvent) {
        let mut topics = self.topics.lock();
        for route in topics.routes.values_mut() {
            route
                .subscribers
                .retain(|_, tx| tx.send(event.clone()).is_ok());
            route.last = None;
        }
    }

    fn resubscribe(&self) {
        let topics = self.topics.lock();
        for topic in topics.routes.keys() {
            debug!("Subscribing to {}", topic);
            if let Err(e) = self.client.try_subscribe(topic.as_str(), QoS::AtLeastOnce) {
                error!("Could not subscribe to {}: {:?}", topic, e);
            }
        }
    }

    fn release(&self, topic: &str, id: u64) {
        let mut topics = self.topics.lock();
        let empty = match topics.routes.get_mut(topic) {
            Some(route) => {
                route.subscribers.remove(&id);
                route.subscribers.is_empty()
            }
            None => false,
        };
        if empty {
            topics.routes.remove(topic);
            debug!("Unsubscribing from {}", topic);
            if let Err(e) = self.client.try_unsubscribe(topic) {
                warn!("Could not unsubscribe from {}: {:?}", topic, e);
            }
        }
    }
}

impl Drop for MqttStoreData {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.get_mut().take() {
            driver.abort();
        }
    }
}

#[async_trait]
impl RemoteStore for MqttStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let topic = self.topic(path);
        let (tx, rx) = mpsc::unbounded_channel();
        let (id, first) = {
            let mut topics = self.topics.lock();
            let id = topics.next_id;
            topics.next_id += 1;
            let first = !topics.routes.contains_key(&topic);
            let route = topics.routes.entry(topic.clone()).or_default();
            if let Some(last) = &route.last {
                let _ = tx.send(last.clone());
            }
            route.subscribers.insert(id, tx);
            (id, first)
        };
        if first {
            debug!("Subscribing to {}", topic);
            self.client
                .subscribe(topic.as_str(), QoS::AtLeastOnce)
                .await
                .with_context(|| format!("Could not subscribe to {}", topic))?;
        }

        let store = Arc::downgrade(&self.0);
        Ok(Subscription::new(rx, move || {
            if let Some(store) = store.upgrade() {
                MqttStore(store).release(&topic, id);
            }
        }))
    }

    async fn update(&self, path: &str, patch: Patch) -> std::result::Result<(), RemoteWriteFailure> {
        let topic = format!("{}/set", self.topic(path));
        let payload =
            serde_json::to_vec(&patch).map_err(|e| RemoteWriteFailure::new(path, e))?;
        trace!("Publishing patch to {}", topic);
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| RemoteWriteFailure::new(path, e))
    }
}

/// An empty retained payload clears the document.
fn decode(payload: &[u8]) -> serde_json::Result<Option<Value>> {
    if payload.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(payload)?;
    Ok(Some(value).filter(|v| !v.is_null()))
}

async fn drive(store: Weak<MqttStoreData>, mut eventloop: EventLoop, reconnect: Duration) {
    loop {
        let event = eventloop.poll().await;
        let store = match store.upgrade() {
            Some(store) => MqttStore(store),
            None => break,
        };
        match event {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("MQTT connected");
                store.resubscribe();
            }
            Ok(Event::Incoming(Incoming::Publish(p))) => store.route(&p.topic, &p.payload),
            Ok(_) => (),
            Err(e) => {
                error!("Error received on MQTT poll: {:?}", e);
                store.broadcast(RemoteEvent::Disconnected(e.to_string()));
                drop(store);
                tokio::time::sleep(reconnect).await;
            }
        }
    }
    debug!("MQTT driver stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[test]
    fn decode_treats_empty_and_null_as_no_data() {
        assert_eq!(decode(b"").unwrap(), None);
        assert_eq!(decode(b"null").unwrap(), None);
        assert_eq!(decode(br#"{"porpeso":1}"#).unwrap(), Some(json!({ "porpeso": 1 })));
        assert!(decode(b"{not json").is_err());
    }

    #[tokio::test]
    async fn topics_are_rooted_at_base_topic() {
        let config = MqttConfiguration {
            base_topic: "minimunch/".into(),
            ..Default::default()
        };
        let store = MqttStore::new(&config).unwrap();
        assert_eq!(store.topic("dispensador"), "minimunch/dispensador");
        assert_eq!(store.topic("/dispensador/status/"), "minimunch/dispensador/status");
    }

    fn offline() -> (MqttStore, EventLoop) {
        MqttStore::with_eventloop(&MqttConfiguration {
            host: "127.0.0.1".into(),
            port: 1,
            ..Default::default()
        })
    }

    fn route_count(store: &MqttStore) -> usize {
        store.topics.lock().routes.len()
    }

    #[tokio::test]
    async fn routed_document_reaches_every_subscriber() {
        let (store, _eventloop) = offline();
        let mut first = store.subscribe("dispensador").await.unwrap();
        let mut second = store.subscribe("dispensador").await.unwrap();
        let mut other = store.subscribe("otro").await.unwrap();

        store.route("minimunch/dispensador", br#"{"porpeso":1}"#);
        let expected = RemoteEvent::Snapshot(Some(json!({ "porpeso": 1 })));
        assert_eq!(first.next().await, Some(expected.clone()));
        assert_eq!(second.next().await, Some(expected));

        store.route("minimunch/otro", b"");
        assert_eq!(other.next().await, Some(RemoteEvent::Snapshot(None)));
    }

    #[tokio::test]
    async fn malformed_document_is_dropped() {
        let (store, _eventloop) = offline();
        let mut sub = store.subscribe("dispensador").await.unwrap();
        store.route("minimunch/dispensador", b"{oops");
        store.route("minimunch/dispensador", br#"{"porprox":1}"#);
        assert_eq!(
            sub.next().await,
            Some(RemoteEvent::Snapshot(Some(json!({ "porprox": 1 }))))
        );
    }

    #[tokio::test]
    async fn late_subscriber_gets_last_document() {
        let (store, _eventloop) = offline();
        let _first = store.subscribe("dispensador").await.unwrap();
        store.route("minimunch/dispensador", br#"{"porpeso":0}"#);

        let mut late = store.subscribe("dispensador").await.unwrap();
        assert_eq!(
            late.next().await,
            Some(RemoteEvent::Snapshot(Some(json!({ "porpeso": 0 }))))
        );
    }

    #[tokio::test]
    async fn fresh_topic_delivers_nothing_until_published() {
        let (store, _eventloop) = offline();
        let mut sub = store.subscribe("dispensador").await.unwrap();
        assert!(futures::poll!(sub.next()).is_pending());
    }

    #[tokio::test]
    async fn disconnect_reaches_subscribers_and_forgets_last() {
        let (store, _eventloop) = offline();
        let mut sub = store.subscribe("dispensador").await.unwrap();
        store.route("minimunch/dispensador", br#"{"porpeso":1}"#);
        sub.next().await;

        store.broadcast(RemoteEvent::Disconnected("connection refused".into()));
        assert_eq!(
            sub.next().await,
            Some(RemoteEvent::Disconnected("connection refused".into()))
        );

        let mut late = store.subscribe("dispensador").await.unwrap();
        assert!(futures::poll!(late.next()).is_pending());
    }

    #[tokio::test]
    async fn route_is_released_with_last_subscriber() {
        let (store, _eventloop) = offline();
        let first = store.subscribe("dispensador").await.unwrap();
        let second = store.subscribe("dispensador").await.unwrap();
        assert_eq!(route_count(&store), 1);

        drop(first);
        assert_eq!(route_count(&store), 1);
        drop(second);
        assert_eq!(route_count(&store), 0);
    }
}
