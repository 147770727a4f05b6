use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const BUTTON_COUNT: usize = 14;

// Digital inputs in tracker order. The discriminant is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ButtonId {
    A = 0,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    LeftStick,
    RightStick,
    Start,
    Back,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl ButtonId {
    pub const ALL: [ButtonId; BUTTON_COUNT] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::LeftBumper,
        ButtonId::RightBumper,
        ButtonId::LeftStick,
        ButtonId::RightStick,
        ButtonId::Start,
        ButtonId::Back,
        ButtonId::DPadUp,
        ButtonId::DPadDown,
        ButtonId::DPadLeft,
        ButtonId::DPadRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Bit of this button in the raw digital mask (XInput layout).
    pub fn mask(self) -> u16 {
        match self {
            ButtonId::DPadUp => 0x0001,
            ButtonId::DPadDown => 0x0002,
            ButtonId::DPadLeft => 0x0004,
            ButtonId::DPadRight => 0x0008,
            ButtonId::Start => 0x0010,
            ButtonId::Back => 0x0020,
            ButtonId::LeftStick => 0x0040,
            ButtonId::RightStick => 0x0080,
            ButtonId::LeftBumper => 0x0100,
            ButtonId::RightBumper => 0x0200,
            ButtonId::A => 0x1000,
            ButtonId::B => 0x2000,
            ButtonId::X => 0x4000,
            ButtonId::Y => 0x8000,
        }
    }

    /// Configuration name of the button
    pub fn name(self) -> &'static str {
        match self {
            ButtonId::A => "A",
            ButtonId::B => "B",
            ButtonId::X => "X",
            ButtonId::Y => "Y",
            ButtonId::LeftBumper => "LB",
            ButtonId::RightBumper => "RB",
            ButtonId::LeftStick => "LS",
            ButtonId::RightStick => "RS",
            ButtonId::Start => "START",
            ButtonId::Back => "BACK",
            ButtonId::DPadUp => "DPAD_UP",
            ButtonId::DPadDown => "DPAD_DOWN",
            ButtonId::DPadLeft => "DPAD_LEFT",
            ButtonId::DPadRight => "DPAD_RIGHT",
        }
    }
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ButtonId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        ButtonId::ALL
            .into_iter()
            .find(|button| button.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| name.to_string())
    }
}

// Classification of one poll for one input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transition {
    #[default]
    Idle,
    Pressed,
    Held,
    Released,
}

impl Transition {
    pub fn from_pair(previous: bool, current: bool) -> Self {
        match (previous, current) {
            (false, true) => Transition::Pressed,
            (true, false) => Transition::Released,
            (true, true) => Transition::Held,
            (false, false) => Transition::Idle,
        }
    }

    /// Only rising and falling edges are turned into events
    pub fn edge(self) -> Option<Edge> {
        match self {
            Transition::Pressed => Some(Edge::Rising),
            Transition::Released => Some(Edge::Falling),
            Transition::Held | Transition::Idle => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Previous/current sample of a single digital input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonState {
    pub previous: bool,
    pub current: bool,
}

impl ButtonState {
    /// Shifts `current` into `previous` and stores the new sample.
    pub fn shift(&mut self, sample: bool) -> Transition {
        self.previous = self.current;
        self.current = sample;
        self.transition()
    }

    pub fn transition(&self) -> Transition {
        Transition::from_pair(self.previous, self.current)
    }
}

/// Result of one tracker update, indexed by [`ButtonId::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transitions([Transition; BUTTON_COUNT]);

impl Transitions {
    pub fn get(&self, button: ButtonId) -> Transition {
        self.0[button.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ButtonId, Transition)> + '_ {
        ButtonId::ALL
            .iter()
            .map(move |button| (*button, self.0[button.index()]))
    }

    /// Buttons with a rising or falling edge, in tracker order
    pub fn edges(&self) -> impl Iterator<Item = (ButtonId, Edge)> + '_ {
        self.iter()
            .filter_map(|(button, transition)| transition.edge().map(|edge| (button, edge)))
    }
}

/// Edge detector for every digital button of the pad.
///
/// All buttons are shifted on every [`update`](Self::update), whether or not
/// their bit changed, so no button can get stuck in `Pressed` or `Released`.
#[derive(Debug, Clone, Default)]
pub struct ButtonEdgeTracker {
    states: [ButtonState; BUTTON_COUNT],
}

impl ButtonEdgeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, raw_mask: u16) -> Transitions {
        let mut transitions = [Transition::Idle; BUTTON_COUNT];
        for button in ButtonId::ALL {
            let sample = raw_mask & button.mask() != 0;
            transitions[button.index()] = self.states[button.index()].shift(sample);
        }
        Transitions(transitions)
    }

    pub fn state(&self, button: ButtonId) -> ButtonState {
        self.states[button.index()]
    }

    pub fn transition(&self, button: ButtonId) -> Transition {
        self.state(button).transition()
    }

    /// Pressed or Held
    pub fn is_active(&self, button: ButtonId) -> bool {
        self.state(button).current
    }

    pub fn is_pressed(&self, button: ButtonId) -> bool {
        self.transition(button) == Transition::Pressed
    }

    pub fn is_held(&self, button: ButtonId) -> bool {
        self.transition(button) == Transition::Held
    }

    pub fn is_released(&self, button: ButtonId) -> bool {
        self.transition(button) == Transition::Released
    }

    pub fn reset(&mut self) {
        self.states = [ButtonState::default(); BUTTON_COUNT];
    }
}
