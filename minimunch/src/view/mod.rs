use crate::prelude::*;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

mod dispatcher;
mod mirror;
mod screen;

pub use dispatcher::ActionDispatcher;
pub use mirror::LocalStateMirror;
pub use screen::StatusScreen;

/// Mirrors the dispenser record into local state and sends user actions
/// back to it.
///
/// Mounting opens the subscription; unmounting, or dropping the last
/// clone, tears it down.
#[derive(Clone, Debug, Deref)]
pub struct DeviceStatusView(Arc<DeviceStatusViewData>);

#[derive(Debug)]
pub struct DeviceStatusViewData {
    path:       String,
    mirror:     SharedMirror,
    dispatcher: ActionDispatcher,
    listener:   Mutex<Option<JoinHandle<()>>>,
}

impl DeviceStatusView {
    pub async fn mount(store: SharedStore, settings: &ViewConfiguration) -> Result<Self> {
        let subscription = store
            .subscribe(&settings.path)
            .await
            .with_context(|| format!("Could not subscribe to '{}'", settings.path))?;
        let (mirror, _) = watch::channel(LocalStateMirror::new(settings.reconcile));
        let mirror = Arc::new(mirror);
        let listener = tokio::spawn(listen(subscription, mirror.clone()));
        info!("Mirroring dispenser record at '{}'", settings.path);
        Ok(DeviceStatusView(Arc::new(DeviceStatusViewData {
            path: settings.path.clone(),
            dispatcher: ActionDispatcher::new(store, settings.path.clone(), mirror.clone()),
            listener: Mutex::new(Some(listener)),
            mirror,
        })))
    }

    /// Receiver that observes every change of the mirrored state.
    pub fn watch(&self) -> watch::Receiver<LocalStateMirror> {
        self.mirror.subscribe()
    }

    pub fn state(&self) -> LocalStateMirror {
        self.mirror.borrow().clone()
    }

    pub fn render(&self) -> StatusScreen {
        StatusScreen::from(&*self.mirror.borrow())
    }

    pub fn toggle_flag(&self, field: Field, value: bool) -> JoinHandle<()> {
        self.dispatcher.toggle_flag(field, value)
    }

    pub fn set_manual_action(&self, label: &str) -> JoinHandle<()> {
        self.dispatcher.set_manual_action(label)
    }

    pub fn is_mounted(&self) -> bool {
        self.listener.lock().is_some()
    }

    /// Stops the snapshot loop and waits until the subscription is released.
    pub async fn unmount(&self) {
        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.abort();
            let _ = listener.await;
            info!("Stopped mirroring '{}'", self.path);
        }
    }
}

impl Drop for DeviceStatusViewData {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get_mut().take() {
            listener.abort();
        }
    }
}

async fn listen(mut subscription: Subscription, mirror: SharedMirror) {
    while let Some(event) = subscription.next().await {
        match &event {
            RemoteEvent::Snapshot(None) => debug!("No data at subscribed path"),
            RemoteEvent::Snapshot(Some(_)) => trace!("Snapshot received"),
            RemoteEvent::Disconnected(reason) => warn!("Remote store unreachable: {}", reason),
        }
        mirror.send_modify(|m| m.apply(&event));
    }
    debug!("Subscription ended");
}
