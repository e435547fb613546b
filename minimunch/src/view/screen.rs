use crate::prelude::*;
use std::fmt;

/// Text rendition of the dispenser screen.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusScreen {
    pub weight_text:      String,
    pub weight_switch:    bool,
    pub proximity_switch: bool,
    pub status_text:      String,
    pub connected:        bool,
}

impl From<&LocalStateMirror> for StatusScreen {
    fn from(m: &LocalStateMirror) -> Self {
        StatusScreen {
            weight_text:      m.display_weight(),
            weight_switch:    m.weight_enabled,
            proximity_switch: m.proximity_enabled,
            status_text:      m.status.clone(),
            connected:        m.connected,
        }
    }
}

fn switch(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for StatusScreen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", Dispenser::MODEL)?;
        writeln!(f, "  Model:             {}", Dispenser::MODEL)?;
        writeln!(
            f,
            "  Max food capacity: {} kg",
            Dispenser::MAX_CAPACITY_GRAMS / 1000.0
        )?;
        writeln!(f, "  Current food:      {}", self.weight_text)?;
        writeln!(f, "  Weight sensor:     {}", switch(self.weight_switch))?;
        writeln!(f, "  Proximity sensor:  {}", switch(self.proximity_switch))?;
        write!(f, "  Dispenser status:  {}", self.status_text)?;
        if !self.connected {
            write!(f, "\n  (offline, showing last known values)")?;
        }
        Ok(())
    }
}
