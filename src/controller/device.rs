//! Device collaborator: the raw pad model and the gilrs backend that fills it.

use gilrs::{Axis, Button, Event, EventType, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

use super::button::ButtonId;

/// Largest magnitude of a raw stick axis
pub const MAX_AXIS_VALUE: i16 = 32767;

/// Largest raw trigger reading
pub const MAX_TRIGGER_VALUE: u8 = 255;

/// Raw pad sample as delivered by the device, before any normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawDeviceState {
    /// Digital buttons, one bit per [`ButtonId::mask`]
    pub buttons: u16,
    /// (x, y), positive y is up
    pub left_stick: (i16, i16),
    pub right_stick: (i16, i16),
    pub left_trigger: u8,
    pub right_trigger: u8,
}

// Device errors
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    #[error("Device backend failure: {0}")]
    Backend(String),
}

/// Source of raw pad samples, read once per poll cycle.
pub trait ControllerDevice {
    fn read_state(&mut self) -> Result<RawDeviceState, DeviceError>;
}

impl<D: ControllerDevice + ?Sized> ControllerDevice for Box<D> {
    fn read_state(&mut self) -> Result<RawDeviceState, DeviceError> {
        (**self).read_state()
    }
}

/// gilrs-backed device following a single gamepad.
///
/// The first connected gamepad is used. When it disconnects the device reports
/// [`DeviceError::Unavailable`] until a gamepad connects again.
#[derive(Debug)]
pub struct GilrsDevice {
    gilrs: Gilrs,
    active_gamepad: Option<GamepadId>,
}

impl GilrsDevice {
    pub fn connect() -> Result<Self, DeviceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(DeviceError::Backend(e.to_string()));
            }
        };

        let active_gamepad = gilrs.gamepads().next().map(|(id, gamepad)| {
            info!("Selected gamepad: {} ({})", gamepad.name(), id);
            id
        });
        if active_gamepad.is_none() {
            warn!("No gamepad connected, waiting for one");
        }

        Ok(Self {
            gilrs,
            active_gamepad,
        })
    }

    // Drain pending gilrs events so cached gamepad state is current
    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    if self.active_gamepad.is_none() {
                        info!("Gamepad {} connected, using it", id);
                        self.active_gamepad = Some(id);
                    }
                }
                EventType::Disconnected => {
                    if self.active_gamepad == Some(id) {
                        warn!("Active gamepad {} disconnected", id);
                        self.active_gamepad = None;
                    }
                }
                _ => {}
            }
        }

        if self.active_gamepad.is_none() {
            self.active_gamepad = self.gilrs.gamepads().next().map(|(id, _)| id);
        }
    }
}

impl ControllerDevice for GilrsDevice {
    fn read_state(&mut self) -> Result<RawDeviceState, DeviceError> {
        self.pump_events();

        let gamepad = self
            .active_gamepad
            .and_then(|id| self.gilrs.connected_gamepad(id))
            .ok_or_else(|| DeviceError::Unavailable("no gamepad connected".to_string()))?;

        let mut buttons = 0u16;
        for button in ButtonId::ALL {
            if gamepad.is_pressed(map_button(button)) {
                buttons |= button.mask();
            }
        }

        let trigger = |button: Button| {
            let value = gamepad
                .button_data(button)
                .map(|data| data.value())
                .unwrap_or(0.0);
            to_raw_trigger(value)
        };

        let state = RawDeviceState {
            buttons,
            left_stick: (
                to_raw_axis(gamepad.value(Axis::LeftStickX)),
                to_raw_axis(gamepad.value(Axis::LeftStickY)),
            ),
            right_stick: (
                to_raw_axis(gamepad.value(Axis::RightStickX)),
                to_raw_axis(gamepad.value(Axis::RightStickY)),
            ),
            left_trigger: trigger(Button::LeftTrigger2),
            right_trigger: trigger(Button::RightTrigger2),
        };
        debug!("Raw device state: {:?}", state);
        Ok(state)
    }
}

// Helper function to map our ButtonId to the gilrs button
fn map_button(button: ButtonId) -> Button {
    match button {
        ButtonId::A => Button::South,
        ButtonId::B => Button::East,
        ButtonId::X => Button::West,
        ButtonId::Y => Button::North,
        ButtonId::Start => Button::Start,
        ButtonId::Back => Button::Select,
        ButtonId::LeftBumper => Button::LeftTrigger,
        ButtonId::RightBumper => Button::RightTrigger,
        ButtonId::LeftStick => Button::LeftThumb,
        ButtonId::RightStick => Button::RightThumb,
        ButtonId::DPadUp => Button::DPadUp,
        ButtonId::DPadDown => Button::DPadDown,
        ButtonId::DPadLeft => Button::DPadLeft,
        ButtonId::DPadRight => Button::DPadRight,
    }
}

fn to_raw_axis(value: f32) -> i16 {
    let max = f32::from(MAX_AXIS_VALUE);
    (value.clamp(-1.0, 1.0) * max).round() as i16
}

fn to_raw_trigger(value: f32) -> u8 {
    let max = f32::from(MAX_TRIGGER_VALUE);
    (value.clamp(0.0, 1.0) * max).round() as u8
}
