//! Controller subsystem for gamepad input handling
//!
//! Implements a fixed-rate polling pipeline:
//!
//! 1. [`device`] - Raw pad samples (gilrs backend)
//! 2. [`button`] / [`axis`] - Edge tracking and deadzone filtering
//! 3. [`combination`] - Cooldown-gated toggle combination
//! 4. [`poller`] - Frame loop turning samples into [`events::FrameEvents`]
//! 5. [`controller_handle`] - Poll thread lifecycle
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► Device ──► Poller ──► FrameEvents ──► Dispatcher
//!            (Raw)      (Edges, Axes, Combination)
//! ```
//!
//! The poll thread runs at the configured frame period (8ms by default) and
//! sleeps out whatever is left of each frame.

pub mod axis;
pub mod button;
pub mod combination;
pub mod controller_handle;
pub mod device;
pub mod events;
pub mod poller;
