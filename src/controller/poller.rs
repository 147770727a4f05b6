use chrono::Local;
use statum::{machine, state};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::axis::{AxisFrame, AxisSampler, Deadzones, Threshold, TriggerType};
use super::button::{ButtonEdgeTracker, ButtonState, Edge};
use super::combination::{CombinationMatcher, CombinationSpec};
use super::device::ControllerDevice;
use super::events::{ControllerEvent, FrameEvents};

/// Accepted frame period range
pub const MIN_FRAME_PERIOD: Duration = Duration::from_millis(4);
pub const MAX_FRAME_PERIOD: Duration = Duration::from_millis(32);

// Poller settings, validated by the config layer before the loop exists
#[derive(Clone, Debug)]
pub struct PollerSettings {
    pub frame_period: Duration,
    pub deadzones: Deadzones,
    pub combination: CombinationSpec,
    pub trigger_threshold: Threshold,
    pub cooldown: Duration,
}

// Dispatch errors
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Event queue full, frame {0} dropped")]
    QueueFull(u64),

    #[error("Event queue closed, frame {0} dropped")]
    QueueClosed(u64),
}

/// Time left of the frame budget. Never negative.
pub fn remaining_budget(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Per-cycle stopwatch
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    target: Duration,
    frame_start: Instant,
}

impl FrameClock {
    pub fn start(target: Duration) -> Self {
        Self {
            target,
            frame_start: Instant::now(),
        }
    }

    pub fn frame_start(&self) -> Instant {
        self.frame_start
    }

    pub fn target(&self) -> Duration {
        self.target
    }

    pub fn elapsed(&self) -> Duration {
        self.frame_start.elapsed()
    }
}

/// Outcome of one [`Poller::run_cycle`]
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub device_available: bool,
    pub combination_matched: bool,
    pub events: usize,
    pub dispatched: bool,
    /// Time spent before the suspension point
    pub busy: Duration,
    /// Requested suspension, zero when the frame overran its budget
    pub slept: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollStats {
    pub cycles: u64,
    pub overruns: u64,
    pub unavailable_frames: u64,
    pub dropped_batches: u64,
    pub combinations: u64,
}

#[state]
#[derive(Debug, Clone)]
pub enum PollerState {
    Configured,
    Polling,
    Stopped,
}

#[machine]
#[derive(Debug)]
pub struct Poller<S: PollerState> {
    settings: PollerSettings,

    // Edge tracking, owned by the polling thread only
    buttons: ButtonEdgeTracker,
    triggers: [ButtonState; 2],

    sampler: AxisSampler,
    matcher: CombinationMatcher,

    // Queue towards the dispatcher
    event_sender: mpsc::Sender<FrameEvents>,

    stats: PollStats,
    device_available: bool,
    dispatch_failing: bool,
}

impl<S: PollerState> Poller<S> {
    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn buttons(&self) -> &ButtonEdgeTracker {
        &self.buttons
    }
}

impl Poller<Configured> {
    pub fn create(settings: PollerSettings, event_sender: mpsc::Sender<FrameEvents>) -> Self {
        debug!("Creating poller with settings: {:?}", settings);
        let sampler = AxisSampler::new(settings.deadzones);
        let matcher = CombinationMatcher::new(
            settings.combination.clone(),
            settings.trigger_threshold,
            settings.cooldown,
        );

        Self::new(
            settings,
            ButtonEdgeTracker::new(),
            [ButtonState::default(); 2],
            sampler,
            matcher,
            event_sender,
            PollStats::default(),
            true,  // device_available
            false, // dispatch_failing
        )
    }

    pub fn start(self) -> Poller<Polling> {
        info!(
            "Poller configured, polling every {:.2}ms",
            self.settings.frame_period.as_secs_f64() * 1000.0
        );
        self.transition()
    }
}

impl Poller<Polling> {
    /// Runs one frame: sample, derive events, dispatch, then sleep out the budget.
    pub fn run_cycle<D: ControllerDevice + ?Sized>(&mut self, device: &mut D) -> FrameReport {
        let clock = FrameClock::start(self.settings.frame_period);
        self.stats.cycles += 1;
        let frame = self.stats.cycles;

        let mut report = FrameReport {
            frame,
            device_available: false,
            combination_matched: false,
            events: 0,
            dispatched: false,
            busy: Duration::ZERO,
            slept: Duration::ZERO,
        };

        match device.read_state() {
            Ok(raw) => {
                if !self.device_available {
                    info!("Device available again at frame {}", frame);
                    self.device_available = true;
                }
                let axes = self.sampler.sample(&raw);
                let transitions = self.buttons.update(raw.buttons);

                let mut events = Vec::new();
                if self.matcher.evaluate(&self.buttons, &axes, clock.frame_start()) {
                    info!("Combination {} matched at frame {}", self.matcher.spec(), frame);
                    self.stats.combinations += 1;
                    report.combination_matched = true;
                    events.push(ControllerEvent::CombinationMatched);
                }
                for (button, edge) in transitions.edges() {
                    events.push(match edge {
                        Edge::Rising => ControllerEvent::ButtonPressed(button),
                        Edge::Falling => ControllerEvent::ButtonReleased(button),
                    });
                }
                self.push_trigger_edges(&axes, &mut events);
                events.extend(
                    self.sampler
                        .deflections(&axes)
                        .map(|(axis, value)| ControllerEvent::AxisDeflected { axis, value }),
                );

                report.device_available = true;
                report.events = events.len();
                report.dispatched = match self.dispatch(FrameEvents::new(frame, events)) {
                    Ok(()) => {
                        if self.dispatch_failing {
                            info!("Event queue accepting again at frame {}", frame);
                            self.dispatch_failing = false;
                        }
                        true
                    }
                    Err(e) => {
                        self.stats.dropped_batches += 1;
                        if self.dispatch_failing {
                            debug!("{}", e);
                        } else {
                            warn!("{}", e);
                            self.dispatch_failing = true;
                        }
                        false
                    }
                };
            }
            Err(e) => {
                // Buttons keep their last state, axes count as centered, nothing is sent
                self.stats.unavailable_frames += 1;
                if self.device_available {
                    warn!("Skipping frames while device is unreadable: {}", e);
                    self.device_available = false;
                } else {
                    debug!("Frame {} skipped: {}", frame, e);
                }
            }
        }

        report.busy = clock.elapsed();
        report.slept = remaining_budget(clock.target(), report.busy);
        if report.slept.is_zero() {
            self.stats.overruns += 1;
            debug!(
                "Frame {} overran its budget ({:.2}ms)",
                frame,
                report.busy.as_secs_f64() * 1000.0
            );
        } else {
            std::thread::sleep(report.slept);
        }
        report
    }

    /// Polls until `cancel` is observed at the top of an iteration.
    pub fn run<D: ControllerDevice + ?Sized>(
        mut self,
        device: &mut D,
        cancel: &CancellationToken,
    ) -> Poller<Stopped> {
        info!("Entering poll loop");

        let mut last_stats_time = Local::now();
        let mut last_stats = self.stats.clone();
        let stats_interval = chrono::Duration::seconds(30);

        while !cancel.is_cancelled() {
            self.run_cycle(device);

            let now = Local::now();
            if now - last_stats_time > stats_interval {
                let elapsed_seconds = (now - last_stats_time).num_seconds().max(1);
                let cycles = self.stats.cycles - last_stats.cycles;
                info!(
                    "Poller stats: {} cycles in {} seconds ({:.1} Hz), {} overruns, {} unavailable, {} dropped",
                    cycles,
                    elapsed_seconds,
                    cycles as f64 / elapsed_seconds as f64,
                    self.stats.overruns - last_stats.overruns,
                    self.stats.unavailable_frames - last_stats.unavailable_frames,
                    self.stats.dropped_batches - last_stats.dropped_batches,
                );
                last_stats_time = now;
                last_stats = self.stats.clone();
            }
        }

        info!("Stop observed after {} cycles", self.stats.cycles);
        self.buttons.reset();
        self.triggers = [ButtonState::default(); 2];
        self.transition()
    }

    fn push_trigger_edges(&mut self, axes: &AxisFrame, events: &mut Vec<ControllerEvent>) {
        let threshold = self.settings.trigger_threshold.value();
        for (slot, trigger) in TriggerType::ALL.into_iter().enumerate() {
            let active = axes.trigger(trigger) >= threshold;
            match self.triggers[slot].shift(active).edge() {
                Some(Edge::Rising) => events.push(ControllerEvent::TriggerPressed(trigger)),
                Some(Edge::Falling) => events.push(ControllerEvent::TriggerReleased(trigger)),
                None => {}
            }
        }
    }

    fn dispatch(&self, batch: FrameEvents) -> Result<(), DispatchError> {
        let frame = batch.frame;
        self.event_sender.try_send(batch).map_err(|e| match e {
            TrySendError::Full(_) => DispatchError::QueueFull(frame),
            TrySendError::Closed(_) => DispatchError::QueueClosed(frame),
        })
    }
}

impl Poller<Stopped> {
    pub fn into_stats(self) -> PollStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::axis::AxisId;
    use crate::controller::button::ButtonId;
    use crate::controller::combination::Requirement;
    use crate::controller::device::{DeviceError, RawDeviceState};
    use std::collections::VecDeque;

    struct ScriptedDevice {
        frames: VecDeque<Result<RawDeviceState, DeviceError>>,
        read_delay: Duration,
        reads: u64,
        cancel_after: Option<(u64, CancellationToken)>,
    }

    impl ScriptedDevice {
        fn new(frames: Vec<Result<RawDeviceState, DeviceError>>) -> Self {
            Self {
                frames: frames.into(),
                read_delay: Duration::ZERO,
                reads: 0,
                cancel_after: None,
            }
        }
    }

    impl ControllerDevice for ScriptedDevice {
        fn read_state(&mut self) -> Result<RawDeviceState, DeviceError> {
            self.reads += 1;
            if !self.read_delay.is_zero() {
                std::thread::sleep(self.read_delay);
            }
            if let Some((n, token)) = &self.cancel_after {
                if self.reads == *n {
                    token.cancel();
                }
            }
            self.frames
                .pop_front()
                .unwrap_or_else(|| Ok(RawDeviceState::default()))
        }
    }

    fn buttons(list: &[ButtonId]) -> RawDeviceState {
        RawDeviceState {
            buttons: list.iter().fold(0, |acc, b| acc | b.mask()),
            ..Default::default()
        }
    }

    fn settings(frame_period: Duration) -> PollerSettings {
        PollerSettings {
            frame_period,
            deadzones: Deadzones {
                left_stick: Threshold::new(0.3).unwrap(),
                right_stick: Threshold::new(0.5).unwrap(),
                trigger: Threshold::new(0.5).unwrap(),
            },
            combination: CombinationSpec::new(vec![
                Requirement::Button(ButtonId::Back),
                Requirement::Button(ButtonId::A),
                Requirement::Button(ButtonId::X),
            ])
            .unwrap(),
            trigger_threshold: Threshold::new(0.5).unwrap(),
            cooldown: Duration::from_secs(1),
        }
    }

    fn poller(capacity: usize) -> (Poller<Polling>, mpsc::Receiver<FrameEvents>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Poller::create(settings(MIN_FRAME_PERIOD), tx).start(), rx)
    }

    #[test]
    fn test_remaining_budget() {
        let period = Duration::from_micros(8333);
        assert_eq!(
            remaining_budget(period, Duration::from_millis(2)),
            Duration::from_micros(6333)
        );
        assert_eq!(remaining_budget(period, Duration::from_millis(10)), Duration::ZERO);
        assert_eq!(remaining_budget(period, period), Duration::ZERO);
    }

    #[test]
    fn test_cycle_sleeps_remaining_budget() {
        let (tx, _rx) = mpsc::channel(8);
        let period = Duration::from_micros(8333);
        let mut poller = Poller::create(settings(period), tx).start();
        let mut device = ScriptedDevice::new(vec![]);
        device.read_delay = Duration::from_millis(2);

        let started = Instant::now();
        let report = poller.run_cycle(&mut device);
        let total = started.elapsed();

        assert!(report.busy >= Duration::from_millis(2));
        assert!(report.slept <= Duration::from_micros(6333));
        assert!(report.slept > Duration::ZERO);
        assert!(total >= period);
    }

    #[test]
    fn test_cycle_over_budget_does_not_sleep() {
        let (tx, _rx) = mpsc::channel(8);
        let mut poller = Poller::create(settings(Duration::from_micros(8333)), tx).start();
        let mut device = ScriptedDevice::new(vec![]);
        device.read_delay = Duration::from_millis(10);

        let report = poller.run_cycle(&mut device);
        assert_eq!(report.slept, Duration::ZERO);
        assert_eq!(poller.stats().overruns, 1);
    }

    #[test]
    fn test_edges_are_emitted_once() {
        let (mut poller, mut rx) = poller(16);
        let mut device = ScriptedDevice::new(vec![
            Ok(buttons(&[ButtonId::B])),
            Ok(buttons(&[ButtonId::B])),
            Ok(buttons(&[])),
        ]);

        for _ in 0..3 {
            poller.run_cycle(&mut device);
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(first.events, vec![ControllerEvent::ButtonPressed(ButtonId::B)]);
        let second = rx.try_recv().unwrap();
        assert!(second.events.is_empty());
        let third = rx.try_recv().unwrap();
        assert_eq!(third.events, vec![ControllerEvent::ButtonReleased(ButtonId::B)]);
    }

    #[test]
    fn test_combination_leads_the_batch() {
        let (mut poller, mut rx) = poller(16);
        let combo = buttons(&[ButtonId::Back, ButtonId::A, ButtonId::X]);
        let mut device = ScriptedDevice::new(vec![Ok(combo), Ok(combo)]);

        let report = poller.run_cycle(&mut device);
        assert!(report.combination_matched);
        let batch = rx.try_recv().unwrap();
        assert_eq!(batch.events[0], ControllerEvent::CombinationMatched);
        assert_eq!(batch.events.len(), 4);

        // Still held inside the cooldown
        let report = poller.run_cycle(&mut device);
        assert!(!report.combination_matched);
        assert!(!rx.try_recv().unwrap().combination_matched());
    }

    #[test]
    fn test_deflection_and_trigger_events() {
        let (mut poller, mut rx) = poller(16);
        let mut device = ScriptedDevice::new(vec![
            Ok(RawDeviceState {
                left_stick: (16000, 100),
                right_trigger: 255,
                ..Default::default()
            }),
            Ok(RawDeviceState::default()),
        ]);

        poller.run_cycle(&mut device);
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch.events[0],
            ControllerEvent::TriggerPressed(TriggerType::Right)
        );
        let x = batch.deflection(AxisId::LeftStickX).unwrap();
        assert!((x - 0.488).abs() < 0.001);
        assert!(batch.deflection(AxisId::LeftStickY).is_none());
        assert_eq!(batch.deflection(AxisId::RightTrigger), Some(1.0));

        poller.run_cycle(&mut device);
        let batch = rx.try_recv().unwrap();
        assert_eq!(
            batch.events,
            vec![ControllerEvent::TriggerReleased(TriggerType::Right)]
        );
    }

    #[test]
    fn test_unavailable_device_skips_frame() {
        let (mut poller, mut rx) = poller(16);
        let mut device = ScriptedDevice::new(vec![
            Ok(buttons(&[ButtonId::Y])),
            Err(DeviceError::Unavailable("unplugged".to_string())),
            Err(DeviceError::Unavailable("unplugged".to_string())),
            Ok(buttons(&[ButtonId::Y])),
        ]);

        assert!(poller.run_cycle(&mut device).device_available);
        let report = poller.run_cycle(&mut device);
        assert!(!report.device_available);
        assert!(!report.dispatched);
        poller.run_cycle(&mut device);
        assert!(poller.buttons().is_active(ButtonId::Y));
        let report = poller.run_cycle(&mut device);
        assert!(report.device_available);

        assert_eq!(
            rx.try_recv().unwrap().events,
            vec![ControllerEvent::ButtonPressed(ButtonId::Y)]
        );
        // Y stayed down through the outage, so no second press
        let after = rx.try_recv().unwrap();
        assert_eq!(after.frame, 4);
        assert!(after.events.is_empty());
        assert!(rx.try_recv().is_err());
        assert_eq!(poller.stats().unavailable_frames, 2);
    }

    fn right_trigger(value: u8) -> RawDeviceState {
        RawDeviceState {
            right_trigger: value,
            ..Default::default()
        }
    }

    fn trigger_presses(batch: &FrameEvents) -> usize {
        batch
            .events
            .iter()
            .filter(|event| matches!(event, ControllerEvent::TriggerPressed(_)))
            .count()
    }

    #[test]
    fn test_held_trigger_presses_once() {
        let (mut poller, mut rx) = poller(16);
        let mut device = ScriptedDevice::new(vec![
            Ok(right_trigger(255)),
            Ok(right_trigger(255)),
            Ok(right_trigger(255)),
        ]);
        for _ in 0..3 {
            poller.run_cycle(&mut device);
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(trigger_presses(&first), 1);
        for _ in 0..2 {
            let held = rx.try_recv().unwrap();
            assert_eq!(trigger_presses(&held), 0);
            assert_eq!(held.deflection(AxisId::RightTrigger), Some(1.0));
        }
    }

    #[test]
    fn test_trigger_held_through_outage_presses_once() {
        let (mut poller, mut rx) = poller(16);
        let mut device = ScriptedDevice::new(vec![
            Ok(right_trigger(255)),
            Err(DeviceError::Unavailable("unplugged".to_string())),
            Ok(right_trigger(255)),
        ]);
        for _ in 0..3 {
            poller.run_cycle(&mut device);
        }

        assert_eq!(
            rx.try_recv().unwrap().events[0],
            ControllerEvent::TriggerPressed(TriggerType::Right)
        );
        let after = rx.try_recv().unwrap();
        assert_eq!(after.frame, 3);
        assert_eq!(trigger_presses(&after), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_queue_drops_without_stalling() {
        let (mut poller, mut rx) = poller(1);
        let mut device = ScriptedDevice::new(vec![]);

        assert!(poller.run_cycle(&mut device).dispatched);
        assert!(!poller.run_cycle(&mut device).dispatched);
        assert!(!poller.run_cycle(&mut device).dispatched);
        assert_eq!(poller.stats().dropped_batches, 2);

        assert_eq!(rx.try_recv().unwrap().frame, 1);
        assert!(poller.run_cycle(&mut device).dispatched);
    }

    #[test]
    fn test_closed_queue_keeps_polling() {
        let (mut poller, rx) = poller(4);
        drop(rx);
        let mut device = ScriptedDevice::new(vec![]);
        for _ in 0..3 {
            assert!(!poller.run_cycle(&mut device).dispatched);
        }
        assert_eq!(poller.stats().cycles, 3);
    }

    #[test]
    fn test_stop_is_observed_at_next_iteration() {
        let (poller, _rx) = poller(64);
        let cancel = CancellationToken::new();
        let mut device = ScriptedDevice::new(vec![]);
        device.cancel_after = Some((5, cancel.clone()));

        let stopped = poller.run(&mut device, &cancel);
        assert_eq!(device.reads, 5);
        assert_eq!(stopped.stats().cycles, 5);
    }

    #[test]
    fn test_stop_before_start_runs_nothing() {
        let (poller, _rx) = poller(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut device = ScriptedDevice::new(vec![]);
        let stopped = poller.run(&mut device, &cancel);
        assert_eq!(device.reads, 0);
        assert_eq!(stopped.into_stats().cycles, 0);
    }

    #[test]
    fn test_stopping_resets_tracker() {
        let (mut poller, _rx) = poller(4);
        let mut device = ScriptedDevice::new(vec![Ok(buttons(&[ButtonId::Start]))]);
        poller.run_cycle(&mut device);
        assert!(poller.buttons().is_active(ButtonId::Start));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let stopped = poller.run(&mut device, &cancel);
        assert!(!stopped.buttons().is_active(ButtonId::Start));
    }
}
