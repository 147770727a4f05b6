use serde::{Deserialize, Serialize};
use std::fmt;

use super::device::{RawDeviceState, MAX_AXIS_VALUE, MAX_TRIGGER_VALUE};

// Trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerType {
    Left,
    Right,
}

impl TriggerType {
    pub const ALL: [TriggerType; 2] = [TriggerType::Left, TriggerType::Right];

    pub fn axis(self) -> AxisId {
        match self {
            TriggerType::Left => AxisId::LeftTrigger,
            TriggerType::Right => AxisId::RightTrigger,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TriggerType::Left => "LT",
            TriggerType::Right => "RT",
        }
    }
}

pub const AXIS_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisId {
    LeftStickX = 0,
    LeftStickY,
    RightStickX,
    RightStickY,
    LeftTrigger,
    RightTrigger,
}

impl AxisId {
    pub const ALL: [AxisId; AXIS_COUNT] = [
        AxisId::LeftStickX,
        AxisId::LeftStickY,
        AxisId::RightStickX,
        AxisId::RightStickY,
        AxisId::LeftTrigger,
        AxisId::RightTrigger,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn class(self) -> AxisClass {
        match self {
            AxisId::LeftStickX | AxisId::LeftStickY => AxisClass::LeftStick,
            AxisId::RightStickX | AxisId::RightStickY => AxisClass::RightStick,
            AxisId::LeftTrigger | AxisId::RightTrigger => AxisClass::Trigger,
        }
    }
}

impl fmt::Display for AxisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Group of axes sharing one deadzone setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisClass {
    LeftStick,
    RightStick,
    Trigger,
}

/// A threshold known to lie in `[0.0, 1.0]`.
///
/// Only constructed through [`Threshold::new`], so range checks happen once
/// when the configuration is validated and never on the polling path.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deadzones {
    pub left_stick: Threshold,
    pub right_stick: Threshold,
    pub trigger: Threshold,
}

impl Deadzones {
    pub fn for_class(&self, class: AxisClass) -> Threshold {
        match class {
            AxisClass::LeftStick => self.left_stick,
            AxisClass::RightStick => self.right_stick,
            AxisClass::Trigger => self.trigger,
        }
    }
}

/// Divides a raw reading by its maximum magnitude.
///
/// The raw range already bounds the result, nothing is clamped here.
pub fn normalize(raw: i32, raw_max: i32) -> f64 {
    f64::from(raw) / f64::from(raw_max)
}

pub fn is_beyond_threshold(value: f64, threshold: Threshold) -> bool {
    value.abs() > threshold.value()
}

/// Normalized axis values of one frame, indexed by [`AxisId::index`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisFrame([f64; AXIS_COUNT]);

impl AxisFrame {
    pub fn get(&self, axis: AxisId) -> f64 {
        self.0[axis.index()]
    }

    pub fn trigger(&self, trigger: TriggerType) -> f64 {
        self.get(trigger.axis())
    }

    pub fn iter(&self) -> impl Iterator<Item = (AxisId, f64)> + '_ {
        AxisId::ALL.iter().map(move |axis| (*axis, self.0[axis.index()]))
    }
}

/// Applies per-class deadzones to raw analog readings.
#[derive(Debug, Clone)]
pub struct AxisSampler {
    deadzones: Deadzones,
}

impl AxisSampler {
    pub fn new(deadzones: Deadzones) -> Self {
        Self { deadzones }
    }

    pub fn sample(&self, raw: &RawDeviceState) -> AxisFrame {
        let axis_max = i32::from(MAX_AXIS_VALUE);
        let trigger_max = i32::from(MAX_TRIGGER_VALUE);
        AxisFrame([
            normalize(i32::from(raw.left_stick.0), axis_max),
            normalize(i32::from(raw.left_stick.1), axis_max),
            normalize(i32::from(raw.right_stick.0), axis_max),
            normalize(i32::from(raw.right_stick.1), axis_max),
            normalize(i32::from(raw.left_trigger), trigger_max),
            normalize(i32::from(raw.right_trigger), trigger_max),
        ])
    }

    pub fn is_deflected(&self, axis: AxisId, value: f64) -> bool {
        is_beyond_threshold(value, self.deadzones.for_class(axis.class()))
    }

    /// Axes of the frame that lie outside their deadzone, in [`AxisId::ALL`] order
    pub fn deflections<'a>(
        &'a self,
        frame: &'a AxisFrame,
    ) -> impl Iterator<Item = (AxisId, f64)> + 'a {
        frame
            .iter()
            .filter(move |(axis, value)| self.is_deflected(*axis, *value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold(v: f64) -> Threshold {
        Threshold::new(v).unwrap()
    }

    fn sampler() -> AxisSampler {
        AxisSampler::new(Deadzones {
            left_stick: threshold(0.3),
            right_stick: threshold(0.5),
            trigger: threshold(0.5),
        })
    }

    #[test]
    fn test_normalize_endpoints() {
        let max = i32::from(MAX_AXIS_VALUE);
        assert_eq!(normalize(max, max), 1.0);
        assert_eq!(normalize(0, max), 0.0);
        assert_eq!(normalize(-max, max), -1.0);
        assert_eq!(normalize(255, 255), 1.0);
    }

    #[test]
    fn test_normalize_is_linear() {
        let max = i32::from(MAX_AXIS_VALUE);
        let half = normalize(16000, max);
        let double = normalize(32000, max);
        assert!((double - 2.0 * half).abs() < 1e-12);
    }

    #[test]
    fn test_left_stick_example() {
        let value = normalize(16000, 32767);
        assert!((value - 0.488).abs() < 0.001);
        assert!(is_beyond_threshold(value, threshold(0.3)));
        assert!(is_beyond_threshold(-value, threshold(0.3)));
    }

    #[test]
    fn test_threshold_is_strict() {
        assert!(!is_beyond_threshold(0.3, threshold(0.3)));
        assert!(!is_beyond_threshold(0.0, threshold(0.0)));
        assert!(is_beyond_threshold(0.01, threshold(0.0)));
        assert!(!is_beyond_threshold(1.0, threshold(1.0)));
    }

    #[test]
    fn test_threshold_range() {
        assert!(Threshold::new(0.0).is_some());
        assert!(Threshold::new(1.0).is_some());
        assert!(Threshold::new(-0.01).is_none());
        assert!(Threshold::new(1.01).is_none());
        assert!(Threshold::new(f64::NAN).is_none());
    }

    #[test]
    fn test_sample_maps_every_axis() {
        let raw = RawDeviceState {
            buttons: 0,
            left_stick: (16000, -32767),
            right_stick: (0, 32767),
            left_trigger: 255,
            right_trigger: 0,
        };
        let frame = sampler().sample(&raw);
        assert!((frame.get(AxisId::LeftStickX) - 0.488).abs() < 0.001);
        assert_eq!(frame.get(AxisId::LeftStickY), -1.0);
        assert_eq!(frame.get(AxisId::RightStickX), 0.0);
        assert_eq!(frame.get(AxisId::RightStickY), 1.0);
        assert_eq!(frame.trigger(TriggerType::Left), 1.0);
        assert_eq!(frame.trigger(TriggerType::Right), 0.0);
    }

    #[test]
    fn test_deflections_use_class_deadzone() {
        let sampler = sampler();
        let raw = RawDeviceState {
            buttons: 0,
            // 0.4 on both sticks: beyond left (0.3), inside right (0.5)
            left_stick: (13107, 0),
            right_stick: (13107, 0),
            left_trigger: 200,
            right_trigger: 100,
        };
        let frame = sampler.sample(&raw);
        let deflected: Vec<AxisId> = sampler.deflections(&frame).map(|(a, _)| a).collect();
        assert_eq!(deflected, vec![AxisId::LeftStickX, AxisId::LeftTrigger]);
    }
}
