use tokio::sync::watch;
use tracing::{debug, info};

use super::{DesktopCommand, Key, MouseButton};
use crate::controller::axis::{AxisId, TriggerType};
use crate::controller::button::ButtonId;
use crate::controller::events::{ControllerEvent, FrameEvents};

#[derive(Clone, Debug, PartialEq)]
pub struct DesktopSettings {
    pub start_enabled: bool,
    pub max_cursor_speed: f64,
}

/// Direction the right stick currently points at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Section {
    North,
    South,
    West,
    East,
    #[default]
    Center,
}

impl Section {
    /// Up and down win over left and right
    fn from_deflection(x: Option<f64>, y: Option<f64>) -> Self {
        match (x, y) {
            (_, Some(y)) if y > 0.0 => Section::North,
            (_, Some(y)) if y < 0.0 => Section::South,
            (Some(x), _) if x < 0.0 => Section::West,
            (Some(x), _) if x > 0.0 => Section::East,
            _ => Section::Center,
        }
    }

    fn key(self) -> Option<Key> {
        match self {
            Section::North => Some(Key::VolumeUp),
            Section::South => Some(Key::VolumeDown),
            Section::West => Some(Key::MediaPrevious),
            Section::East => Some(Key::MediaNext),
            Section::Center => None,
        }
    }
}

/// Maps frame batches to desktop commands while active.
///
/// Held inputs (left mouse button, Alt, help overlay) are tracked so
/// deactivation never leaves them stuck.
#[derive(Debug)]
pub struct DesktopManager {
    settings: DesktopSettings,
    active: bool,
    status: watch::Sender<bool>,
    right_stick: Section,
    left_mouse_down: bool,
    alt_down: bool,
    help_shown: bool,
}

impl DesktopManager {
    pub fn new(settings: DesktopSettings, status: watch::Sender<bool>) -> Self {
        let active = settings.start_enabled;
        status.send_replace(active);
        info!("Desktop manager created, active: {}", active);
        Self {
            settings,
            active,
            status,
            right_stick: Section::Center,
            left_mouse_down: false,
            alt_down: false,
            help_shown: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handle_frame(&mut self, batch: &FrameEvents) -> Vec<DesktopCommand> {
        let mut commands = Vec::new();

        let section = Section::from_deflection(
            batch.deflection(AxisId::RightStickX),
            batch.deflection(AxisId::RightStickY),
        );
        let entered = (section != self.right_stick).then_some(section);
        self.right_stick = section;

        if batch.combination_matched() {
            self.toggle(&mut commands);
            // Presses that completed the combination are not actions
            for event in &batch.events {
                if matches!(
                    event,
                    ControllerEvent::ButtonReleased(_) | ControllerEvent::TriggerReleased(_)
                ) {
                    self.handle_event(event, &mut commands);
                }
            }
            return commands;
        }

        for event in &batch.events {
            self.handle_event(event, &mut commands);
        }
        if !self.active {
            return commands;
        }

        if let Some(key) = entered.and_then(Section::key) {
            debug!("Right stick entered {:?}", section);
            commands.push(DesktopCommand::Tap(key));
        }

        let x = batch.deflection(AxisId::LeftStickX);
        let y = batch.deflection(AxisId::LeftStickY);
        if x.is_some() || y.is_some() {
            let speed = self.settings.max_cursor_speed;
            commands.push(DesktopCommand::MoveCursorBy {
                dx: (x.unwrap_or(0.0) * speed) as i32,
                dy: (-y.unwrap_or(0.0) * speed) as i32,
            });
        }

        commands
    }

    fn toggle(&mut self, commands: &mut Vec<DesktopCommand>) {
        self.active = !self.active;
        self.status.send_replace(self.active);
        info!(
            "Desktop manager {}",
            if self.active { "activated" } else { "deactivated" }
        );
        if !self.active {
            self.release_held(commands);
        }
    }

    fn release_held(&mut self, commands: &mut Vec<DesktopCommand>) {
        if self.left_mouse_down {
            self.left_mouse_down = false;
            commands.push(DesktopCommand::MouseUp(MouseButton::Left));
        }
        if self.alt_down {
            self.alt_down = false;
            commands.push(DesktopCommand::KeyUp(Key::Alt));
        }
        if self.help_shown {
            self.help_shown = false;
            commands.push(DesktopCommand::HideHelp);
        }
    }

    fn handle_event(&mut self, event: &ControllerEvent, commands: &mut Vec<DesktopCommand>) {
        match event {
            // Releases of held inputs go out even while inactive
            ControllerEvent::ButtonReleased(ButtonId::A) if self.left_mouse_down => {
                self.left_mouse_down = false;
                commands.push(DesktopCommand::MouseUp(MouseButton::Left));
            }
            ControllerEvent::ButtonReleased(ButtonId::LeftBumper) if self.alt_down => {
                self.alt_down = false;
                commands.push(DesktopCommand::KeyUp(Key::Alt));
            }
            ControllerEvent::TriggerReleased(TriggerType::Right) if self.help_shown => {
                self.help_shown = false;
                commands.push(DesktopCommand::HideHelp);
            }
            _ if !self.active => {}
            ControllerEvent::ButtonPressed(button) => {
                let command = self.button_command(*button);
                commands.push(command);
            }
            ControllerEvent::TriggerPressed(TriggerType::Left) => {
                commands.push(DesktopCommand::Tap(Key::Windows));
            }
            ControllerEvent::TriggerPressed(TriggerType::Right) => {
                self.help_shown = true;
                commands.push(DesktopCommand::ShowHelp);
            }
            _ => {}
        }
    }

    fn button_command(&mut self, button: ButtonId) -> DesktopCommand {
        match button {
            ButtonId::A => {
                self.left_mouse_down = true;
                DesktopCommand::MouseDown(MouseButton::Left)
            }
            ButtonId::X => DesktopCommand::Click(MouseButton::Right),
            ButtonId::B => DesktopCommand::Tap(Key::Escape),
            ButtonId::Y => DesktopCommand::Chord(vec![Key::Control, Key::Shift, Key::Escape]),
            ButtonId::Start => DesktopCommand::Tap(Key::Enter),
            ButtonId::Back => DesktopCommand::Chord(vec![Key::Alt, Key::F4]),
            ButtonId::DPadUp => DesktopCommand::Tap(Key::ArrowUp),
            ButtonId::DPadDown => DesktopCommand::Tap(Key::ArrowDown),
            ButtonId::DPadLeft => DesktopCommand::Tap(Key::ArrowLeft),
            ButtonId::DPadRight => DesktopCommand::Tap(Key::ArrowRight),
            ButtonId::LeftStick => DesktopCommand::Chord(vec![Key::Control, Key::Windows, Key::O]),
            ButtonId::RightStick => DesktopCommand::Tap(Key::VolumeMute),
            ButtonId::LeftBumper => {
                self.alt_down = true;
                DesktopCommand::KeyDown(Key::Alt)
            }
            ButtonId::RightBumper => DesktopCommand::Tap(Key::Tab),
        }
    }
}
