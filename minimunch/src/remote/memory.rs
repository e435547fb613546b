use super::*;
use parking_lot::Mutex;
use serde_json::Map;
use std::collections::HashMap;

/// In-process document store with the same merge and snapshot semantics
/// as the realtime database.
#[derive(Clone, Debug, Default, Deref)]
pub struct MemoryStore(Arc<Mutex<MemoryStoreData>>);

#[derive(Debug, Default)]
pub struct MemoryStoreData {
    root:          Value,
    subscribers:   HashMap<u64, Subscriber>,
    next_id:       u64,
    reject_writes: bool,
    history:       Vec<(String, Patch)>,
}

#[derive(Debug)]
struct Subscriber {
    path:   String,
    events: mpsc::UnboundedSender<RemoteEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(record: &DispenserRecord) -> Result<Self> {
        let store = Self::new();
        store.set(Dispenser::RECORD_PATH, serde_json::to_value(record)?);
        Ok(store)
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        lookup(&self.lock().root, path).cloned()
    }

    /// Replaces the value at `path` wholesale, the way the device itself
    /// publishes its state.
    pub fn set(&self, path: &str, value: Value) {
        let mut data = self.lock();
        *entry(&mut data.root, path) = value;
        data.notify(path);
    }

    /// While set, every partial write fails.
    pub fn reject_writes(&self, reject: bool) {
        self.lock().reject_writes = reject;
    }

    /// Accepted partial writes, oldest first.
    pub fn history(&self) -> Vec<(String, Patch)> {
        self.lock().history.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    fn merge(&self, path: &str, patch: Patch) -> std::result::Result<(), RemoteWriteFailure> {
        let mut data = self.lock();
        if data.reject_writes {
            return Err(RemoteWriteFailure::new(path, "store rejected the write"));
        }
        let target = entry(&mut data.root, path);
        if !target.is_object() {
            *target = Value::Object(Map::new());
        }
        if let Value::Object(fields) = target {
            for (key, value) in patch.iter() {
                fields.insert(key.clone(), value.clone());
            }
        }
        data.history.push((path.into(), patch));
        data.notify(path);
        Ok(())
    }
}

impl MemoryStoreData {
    fn notify(&mut self, changed: &str) {
        let root = &self.root;
        self.subscribers.retain(|id, sub| {
            if !overlaps(&sub.path, changed) {
                return true;
            }
            let snapshot = lookup(root, &sub.path).cloned();
            let alive = sub.events.send(RemoteEvent::Snapshot(snapshot)).is_ok();
            if !alive {
                trace!("Dropping closed subscriber {}", id);
            }
            alive
        });
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(&self, path: &str) -> Result<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut data = self.lock();
            let id = data.next_id;
            data.next_id += 1;
            let current = lookup(&data.root, path).cloned();
            tx.send(RemoteEvent::Snapshot(current))
                .map_err(|_| anyhow!("Subscriber for '{}' closed during setup", path))?;
            data.subscribers.insert(
                id,
                Subscriber {
                    path:   path.into(),
                    events: tx,
                },
            );
            id
        };
        debug!("Memory subscription {} opened on '{}'", id, path);
        let store = self.clone();
        Ok(Subscription::new(rx, move || {
            store.lock().subscribers.remove(&id);
            debug!("Memory subscription {} closed", id);
        }))
    }

    async fn update(&self, path: &str, patch: Patch) -> std::result::Result<(), RemoteWriteFailure> {
        self.merge(path, patch)
    }
}

/// Nodes that hold nothing read as no data.
fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path)
        .try_fold(root, |node, key| node.get(key))
        .filter(|v| !v.is_null())
}

/// Walks to `path`, turning every non-object on the way into an object.
fn entry<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    segments(path).fold(root, |node, key| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        match node {
            Value::Object(fields) => fields.entry(key).or_insert(Value::Null),
            _ => unreachable!("node was just turned into an object"),
        }
    })
}
