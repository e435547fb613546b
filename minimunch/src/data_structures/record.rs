use crate::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Merge patch applied to the object at a remote path.
pub type Patch = Map<String, Value>;

/// Sensor switches kept as integer flags at the top level of the record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
pub enum Field {
    #[display(fmt = "porpeso")]
    WeightSensor,
    #[display(fmt = "porprox")]
    ProximitySensor,
}

impl Field {
    pub fn key(self) -> &'static str {
        match self {
            Field::WeightSensor => "porpeso",
            Field::ProximitySensor => "porprox",
        }
    }

    pub fn patch(self, enabled: bool) -> Patch {
        let mut patch = Patch::new();
        patch.insert(self.key().into(), Value::from(if enabled { 1 } else { 0 }));
        patch
    }
}

/// Sentence stored remotely for a manual activation, e.g. `Dispensador Activado`.
pub fn last_action_text(label: &str) -> String {
    format!("{} {}", Labels::ACTION_PREFIX, label)
}

pub fn last_action_patch(label: &str) -> Patch {
    let mut patch = Patch::new();
    patch.insert("last_action".into(), Value::from(last_action_text(label)));
    patch
}

/// The record as the dispenser firmware publishes it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DispenserRecord {
    pub porpeso: u8,
    pub porprox: u8,
    pub status:  DispenserStatus,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DispenserStatus {
    pub weight:      f64,
    pub last_action: String,
}

impl Default for DispenserRecord {
    fn default() -> Self {
        DispenserRecord {
            porpeso: 0,
            porprox: 0,
            status:  DispenserStatus {
                weight:      0.0,
                last_action: last_action_text(Labels::DEACTIVATED),
            },
        }
    }
}

/// Read access to a raw snapshot that never fails on unexpected shapes.
#[derive(Clone, Copy, Debug)]
pub struct RecordView<'a>(&'a Value);

impl<'a> RecordView<'a> {
    pub fn new(value: &'a Value) -> Self {
        RecordView(value)
    }

    /// Only the number 1 counts as enabled.
    pub fn flag(&self, field: Field) -> bool {
        self.0.get(field.key()).and_then(Value::as_f64) == Some(1.0)
    }

    pub fn weight(&self) -> Option<f64> {
        self.0.pointer("/status/weight").and_then(Value::as_f64)
    }

    pub fn last_action(&self) -> Option<&'a str> {
        self.0
            .pointer("/status/last_action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}
