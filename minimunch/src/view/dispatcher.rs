use crate::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;

/// Turns user input into partial writes on the dispenser record.
///
/// Writes are fire-and-forget: each runs on its own task and a failure is
/// only logged. The returned handles may be awaited or ignored.
#[derive(Clone, Debug)]
pub struct ActionDispatcher {
    store:    SharedStore,
    path:     String,
    mirror:   SharedMirror,
    failures: Arc<AtomicU64>,
}

impl ActionDispatcher {
    pub fn new(store: SharedStore, path: String, mirror: SharedMirror) -> Self {
        ActionDispatcher {
            store,
            path,
            mirror,
            failures: Default::default(),
        }
    }

    /// Writes rejected by the store so far.
    pub fn failed_writes(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    fn write_failed(&self, e: &RemoteWriteFailure, what: &str) {
        self.failures.fetch_add(1, Ordering::SeqCst);
        error!("Error {}: {}", what, e);
    }

    /// Flips a sensor switch locally, then writes `{field: 0|1}` to the record.
    pub fn toggle_flag(&self, field: Field, value: bool) -> JoinHandle<()> {
        self.mirror.send_modify(|m| m.set_flag(field, value));
        let zelf = self.clone();
        tokio::spawn(async move {
            debug!("Setting {} to {}", field, value);
            if let Err(e) = zelf.store.update(&zelf.path, field.patch(value)).await {
                zelf.write_failed(&e, &format!("updating {}", field));
                zelf.mirror.send_modify(|m| m.write_failed(field, value));
            }
        })
    }

    /// Writes `Dispensador <label>` as the last action, then shows the bare
    /// label until the next snapshot replaces it with the stored sentence.
    ///
    /// A rejected write leaves the previous status on screen. Reconciling
    /// mirrors show the label right away and roll it back instead.
    pub fn set_manual_action(&self, label: &str) -> JoinHandle<()> {
        let early = self.mirror.borrow().reconciling();
        if early {
            self.mirror.send_modify(|m| m.set_status(label));
        }
        let zelf = self.clone();
        let owned = label.to_string();
        tokio::spawn(async move {
            let path = join_path(&zelf.path, "status");
            debug!("Setting last action to '{}'", last_action_text(&owned));
            match zelf.store.update(&path, last_action_patch(&owned)).await {
                Ok(()) if !early => zelf.mirror.send_modify(|m| m.set_status(&owned)),
                Ok(()) => (),
                Err(e) => {
                    zelf.write_failed(&e, "on manual dispenser activation");
                    zelf.mirror.send_modify(|m| m.status_write_failed(&owned));
                }
            }
        })
    }
}
