//! Desktop side of the pipeline
//!
//! Turns [`FrameEvents`](crate::controller::events::FrameEvents) into
//! high-level mouse and keyboard commands:
//!
//! 1. [`manager`] - Active/inactive state and the button-to-action table
//! 2. [`dispatcher`] - Async task feeding batches through the manager into a sink
//!
//! OS injection lives behind [`CommandSink`]. The shipped [`TracingSink`]
//! only records commands.

pub mod dispatcher;
pub mod manager;

use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Alt,
    Control,
    Shift,
    Windows,
    F4,
    O,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    MediaPrevious,
    MediaNext,
}

/// Command handed to the OS sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopCommand {
    MoveCursorBy { dx: i32, dy: i32 },
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    Click(MouseButton),
    KeyDown(Key),
    KeyUp(Key),
    /// Press and release a single key
    Tap(Key),
    /// Press all keys in order, release in reverse
    Chord(Vec<Key>),
    ShowHelp,
    HideHelp,
}

impl fmt::Display for DesktopCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DesktopCommand::MoveCursorBy { dx, dy } => write!(f, "move cursor by ({}, {})", dx, dy),
            DesktopCommand::MouseDown(button) => write!(f, "{:?} mouse down", button),
            DesktopCommand::MouseUp(button) => write!(f, "{:?} mouse up", button),
            DesktopCommand::Click(button) => write!(f, "{:?} click", button),
            DesktopCommand::KeyDown(key) => write!(f, "{:?} down", key),
            DesktopCommand::KeyUp(key) => write!(f, "{:?} up", key),
            DesktopCommand::Tap(key) => write!(f, "tap {:?}", key),
            DesktopCommand::Chord(keys) => {
                let names: Vec<String> = keys.iter().map(|k| format!("{:?}", k)).collect();
                write!(f, "chord {}", names.join("+"))
            }
            DesktopCommand::ShowHelp => f.write_str("show help"),
            DesktopCommand::HideHelp => f.write_str("hide help"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Command rejected ({command}): {reason}")]
    Rejected { command: String, reason: String },
}

/// Receiver of desktop commands, usually an OS input injector
pub trait CommandSink {
    fn execute(&mut self, command: &DesktopCommand) -> Result<(), SinkError>;
}

/// Sink that records every command in the log
#[derive(Debug, Default)]
pub struct TracingSink {
    executed: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executed(&self) -> u64 {
        self.executed
    }
}

impl CommandSink for TracingSink {
    fn execute(&mut self, command: &DesktopCommand) -> Result<(), SinkError> {
        self.executed += 1;
        match command {
            // One per frame while the stick is held
            DesktopCommand::MoveCursorBy { .. } => debug!("Desktop command: {}", command),
            _ => info!("Desktop command: {}", command),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_sink_counts_commands() {
        let mut sink = TracingSink::new();
        sink.execute(&DesktopCommand::Tap(Key::Enter)).unwrap();
        sink.execute(&DesktopCommand::MoveCursorBy { dx: 3, dy: -2 }).unwrap();
        assert_eq!(sink.executed(), 2);
    }

    #[test]
    fn test_command_display() {
        assert_eq!(
            DesktopCommand::Chord(vec![Key::Control, Key::Shift, Key::Escape]).to_string(),
            "chord Control+Shift+Escape"
        );
        assert_eq!(
            DesktopCommand::MoveCursorBy { dx: 12, dy: -4 }.to_string(),
            "move cursor by (12, -4)"
        );
    }
}
