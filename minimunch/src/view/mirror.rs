use crate::prelude::*;
use chrono::{DateTime, Local};

/// Local copy of the dispenser record, shaped for display.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalStateMirror {
    pub weight_enabled:    bool,
    pub proximity_enabled: bool,
    pub status:            String,
    /// Grams of food, as last reported by the device.
    pub weight:            Option<f64>,
    pub connected:         bool,
    pub last_update:       Option<DateTime<Local>>,
    reconcile:             bool,
    pending:               Pending,
    confirmed:             Confirmed,
}

/// Optimistic values not yet seen in a snapshot. Only used when
/// reconciling.
#[derive(Clone, Debug, Default, PartialEq)]
struct Pending {
    weight_enabled:    Option<bool>,
    proximity_enabled: Option<bool>,
    /// Remote form of the label, i.e. with the action prefix.
    last_action:       Option<String>,
}

/// Values from the latest snapshot.
#[derive(Clone, Debug, PartialEq)]
struct Confirmed {
    weight_enabled:    bool,
    proximity_enabled: bool,
    status:            String,
}

impl Default for LocalStateMirror {
    fn default() -> Self {
        Self::new(false)
    }
}

impl LocalStateMirror {
    pub fn new(reconcile: bool) -> Self {
        LocalStateMirror {
            weight_enabled: false,
            proximity_enabled: false,
            status: Labels::DEFAULT_STATUS.into(),
            weight: None,
            connected: true,
            last_update: None,
            reconcile,
            pending: Default::default(),
            confirmed: Confirmed {
                weight_enabled:    false,
                proximity_enabled: false,
                status:            Labels::DEFAULT_STATUS.into(),
            },
        }
    }

    pub fn reconciling(&self) -> bool {
        self.reconcile
    }

    pub fn flag(&self, field: Field) -> bool {
        match field {
            Field::WeightSensor => self.weight_enabled,
            Field::ProximitySensor => self.proximity_enabled,
        }
    }

    /// Weight in kilograms with two decimals, or the loading placeholder.
    pub fn display_weight(&self) -> String {
        match self.weight {
            Some(grams) => format!("{:.2} kg", grams / 1000.0),
            None => Labels::LOADING.into(),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending != Pending::default()
    }

    pub fn apply(&mut self, event: &RemoteEvent) {
        match event {
            RemoteEvent::Snapshot(Some(value)) => self.apply_snapshot(RecordView::new(value)),
            RemoteEvent::Snapshot(None) => self.connected = true,
            RemoteEvent::Disconnected(_) => self.connected = false,
        }
    }

    fn apply_snapshot(&mut self, record: RecordView<'_>) {
        for field in [Field::WeightSensor, Field::ProximitySensor].iter().copied() {
            let remote = record.flag(field);
            *self.confirmed.flag_mut(field) = remote;
            let pending = self.pending.flag_mut(field);
            let value = match *pending {
                Some(local) if local != remote => local,
                _ => {
                    *pending = None;
                    remote
                }
            };
            *self.flag_mut(field) = value;
        }

        let remote = record
            .last_action()
            .unwrap_or(Labels::DEFAULT_STATUS)
            .to_string();
        self.confirmed.status = remote.clone();
        let settled = match &self.pending.last_action {
            Some(expected) => *expected == remote,
            None => true,
        };
        if settled {
            self.pending.last_action = None;
            self.status = remote;
        }

        self.weight = record.weight();
        self.connected = true;
        self.last_update = Some(Local::now());
    }

    /// Optimistic switch change, ahead of the remote write.
    pub fn set_flag(&mut self, field: Field, value: bool) {
        *self.flag_mut(field) = value;
        if self.reconcile {
            *self.pending.flag_mut(field) = Some(value);
        }
    }

    /// Optimistic status label. The label is shown bare while the record
    /// stores it with the action prefix.
    pub fn set_status(&mut self, label: &str) {
        self.status = label.into();
        if self.reconcile {
            self.pending.last_action = Some(last_action_text(label));
        }
    }

    /// Undo a failed switch write. Only reconciling mirrors roll back, and
    /// only if nothing newer replaced the failed value.
    pub fn write_failed(&mut self, field: Field, value: bool) {
        if !self.reconcile || *self.pending.flag_mut(field) != Some(value) {
            return;
        }
        *self.pending.flag_mut(field) = None;
        *self.flag_mut(field) = self.confirmed.flag(field);
    }

    pub fn status_write_failed(&mut self, label: &str) {
        let expected = last_action_text(label);
        if !self.reconcile || self.pending.last_action.as_deref() != Some(expected.as_str()) {
            return;
        }
        self.pending.last_action = None;
        self.status = self.confirmed.status.clone();
    }

    fn flag_mut(&mut self, field: Field) -> &mut bool {
        match field {
            Field::WeightSensor => &mut self.weight_enabled,
            Field::ProximitySensor => &mut self.proximity_enabled,
        }
    }
}

impl Pending {
    fn flag_mut(&mut self, field: Field) -> &mut Option<bool> {
        match field {
            Field::WeightSensor => &mut self.weight_enabled,
            Field::ProximitySensor => &mut self.proximity_enabled,
        }
    }
}

impl Confirmed {
    fn flag(&self, field: Field) -> bool {
        match field {
            Field::WeightSensor => self.weight_enabled,
            Field::ProximitySensor => self.proximity_enabled,
        }
    }

    fn flag_mut(&mut self, field: Field) -> &mut bool {
        match field {
            Field::WeightSensor => &mut self.weight_enabled,
            Field::ProximitySensor => &mut self.proximity_enabled,
        }
    }
}
