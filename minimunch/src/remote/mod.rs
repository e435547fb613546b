//! Boundary to the realtime key-value store holding the dispenser record.
//!
//! The store is an external collaborator: this crate only subscribes to a
//! path and sends partial merges to it. Two backends exist, an MQTT one for
//! real deployments and an in-process one used by tests and demo mode.

use crate::prelude::*;
use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::{
    fmt,
    pin::Pin,
    task::{Context as TaskContext, Poll},
};
use tokio::sync::mpsc;

mod memory;
mod mqtt;

pub use memory::MemoryStore;
pub use mqtt::MqttStore;

pub type SharedStore = Arc<dyn RemoteStore>;

/// Something delivered by a live subscription.
#[derive(Clone, Debug, PartialEq)]
pub enum RemoteEvent {
    /// Full value at the subscribed path. `None` when nothing is stored there.
    Snapshot(Option<Value>),
    /// The link to the store dropped. The backend reconnects by itself and
    /// resumes with a fresh snapshot.
    Disconnected(String),
}

/// A partial write the store did not accept.
#[derive(Clone, Debug, PartialEq, Display, Error)]
#[display(fmt = "write to '{}' failed: {}", path, reason)]
pub struct RemoteWriteFailure {
    pub path:   String,
    pub reason: String,
}

impl RemoteWriteFailure {
    pub fn new(path: &str, reason: impl ToString) -> Self {
        RemoteWriteFailure {
            path:   path.into(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Opens a live subscription on `path`. The current value is delivered
    /// first, then a full snapshot on every change.
    async fn subscribe(&self, path: &str) -> Result<Subscription>;

    /// Merges the keys of `patch` into the object stored at `path`.
    async fn update(&self, path: &str, patch: Patch) -> std::result::Result<(), RemoteWriteFailure>;
}

/// Creates the store described by the configuration.
pub async fn connect(config: &RemoteConfiguration) -> Result<SharedStore> {
    match config {
        RemoteConfiguration::Mqtt(mqtt) => {
            let store = MqttStore::new(mqtt).context("Could not set up the MQTT store")?;
            Ok(Arc::new(store))
        }
        RemoteConfiguration::Memory(memory) => {
            let store = MemoryStore::with_record(&memory.seed)?;
            Ok(Arc::new(store))
        }
    }
}

/// Handle on a live subscription.
///
/// Yields [`RemoteEvent`]s as a stream. Cancelling it, explicitly or by
/// dropping it, releases the backend registration and ends the stream.
pub struct Subscription {
    events:    mpsc::UnboundedReceiver<RemoteEvent>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        events: mpsc::UnboundedReceiver<RemoteEvent>,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Subscription {
            events,
            on_cancel: Some(Box::new(on_cancel)),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(release) = self.on_cancel.take() {
            self.events.close();
            while self.events.try_recv().is_ok() {}
            release();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.on_cancel.is_none()
    }
}

impl Stream for Subscription {
    type Item = RemoteEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        if self.is_cancelled() {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn cancel_runs_release_once_and_ends_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let released = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = released.clone();
        let mut sub = Subscription::new(rx, move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        tx.send(RemoteEvent::Snapshot(None)).unwrap();
        assert_eq!(sub.next().await, Some(RemoteEvent::Snapshot(None)));

        tx.send(RemoteEvent::Snapshot(None)).unwrap();
        sub.cancel();
        sub.cancel();
        assert!(tx.send(RemoteEvent::Snapshot(None)).is_err());
        assert_eq!(sub.next().await, None);
        drop(sub);
        assert_eq!(released.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn connect_builds_seeded_memory_store() {
        let config = RemoteConfiguration::Memory(MemoryConfiguration::default());
        let store = connect(&config).await.unwrap();
        let mut sub = store.subscribe(Dispenser::RECORD_PATH).await.unwrap();
        match sub.next().await {
            Some(RemoteEvent::Snapshot(Some(v))) => {
                assert_eq!(v["status"]["last_action"], "Dispensador Desactivado")
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn write_failure_names_the_path() {
        let e = RemoteWriteFailure::new("dispensador", "offline");
        assert_eq!(e.to_string(), "write to 'dispensador' failed: offline");
    }
}
