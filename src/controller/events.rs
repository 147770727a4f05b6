use chrono::{DateTime, Local};

use super::axis::{AxisId, TriggerType};
use super::button::ButtonId;

// Semantic event derived from one poll
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    CombinationMatched,
    ButtonPressed(ButtonId),
    ButtonReleased(ButtonId),
    TriggerPressed(TriggerType),
    TriggerReleased(TriggerType),
    /// Only emitted while the axis is outside its deadzone
    AxisDeflected { axis: AxisId, value: f64 },
}

/// All events of one healthy frame, sent as a single queue message.
///
/// Batches are sent for every frame the device could be read, including
/// frames without events. Order inside a batch: combination, button edges,
/// trigger edges, deflections.
#[derive(Debug, Clone)]
pub struct FrameEvents {
    pub frame: u64,
    pub timestamp: DateTime<Local>,
    pub events: Vec<ControllerEvent>,
}

impl FrameEvents {
    pub fn new(frame: u64, events: Vec<ControllerEvent>) -> Self {
        Self {
            frame,
            timestamp: Local::now(),
            events,
        }
    }

    pub fn combination_matched(&self) -> bool {
        self.events.contains(&ControllerEvent::CombinationMatched)
    }

    pub fn deflection(&self, axis: AxisId) -> Option<f64> {
        self.events.iter().find_map(|event| match event {
            ControllerEvent::AxisDeflected { axis: a, value } if *a == axis => Some(*value),
            _ => None,
        })
    }
}
