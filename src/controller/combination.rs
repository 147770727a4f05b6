use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::axis::{AxisFrame, Threshold, TriggerType};
use super::button::{ButtonEdgeTracker, ButtonId};

/// One input that must be active for a combination to match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Button(ButtonId),
    Trigger(TriggerType),
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Button(button) => write!(f, "{}", button),
            Requirement::Trigger(trigger) => f.write_str(trigger.name()),
        }
    }
}

impl FromStr for Requirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if let Some(trigger) = TriggerType::ALL
            .into_iter()
            .find(|trigger| trigger.name().eq_ignore_ascii_case(name))
        {
            return Ok(Requirement::Trigger(trigger));
        }
        name.parse::<ButtonId>().map(Requirement::Button)
    }
}

/// Ordered, immutable list of requirements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinationSpec {
    requirements: Vec<Requirement>,
}

impl CombinationSpec {
    /// Returns `None` for an empty list; an empty combination would match every frame.
    pub fn new(requirements: Vec<Requirement>) -> Option<Self> {
        (!requirements.is_empty()).then_some(Self { requirements })
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }
}

impl fmt::Display for CombinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", requirement)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CooldownTimer {
    last_fire: Option<Instant>,
    cooldown: Duration,
}

impl CooldownTimer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_fire: None,
            cooldown,
        }
    }

    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.last_fire
            .is_some_and(|last| now.saturating_duration_since(last) < self.cooldown)
    }

    pub fn fire(&mut self, now: Instant) {
        self.last_fire = Some(now);
    }

    pub fn last_fire(&self) -> Option<Instant> {
        self.last_fire
    }
}

/// Cooldown-gated AND over a [`CombinationSpec`].
///
/// A match arms the cooldown itself, so a caller that acts once per `true`
/// needs no bookkeeping of its own while the combination stays held.
#[derive(Debug, Clone)]
pub struct CombinationMatcher {
    spec: CombinationSpec,
    trigger_threshold: Threshold,
    timer: CooldownTimer,
}

impl CombinationMatcher {
    pub fn new(spec: CombinationSpec, trigger_threshold: Threshold, cooldown: Duration) -> Self {
        info!(
            "Combination {} armed with {}ms cooldown",
            spec,
            cooldown.as_millis()
        );
        Self {
            spec,
            trigger_threshold,
            timer: CooldownTimer::new(cooldown),
        }
    }

    pub fn spec(&self) -> &CombinationSpec {
        &self.spec
    }

    pub fn timer(&self) -> &CooldownTimer {
        &self.timer
    }

    pub fn evaluate(&mut self, buttons: &ButtonEdgeTracker, axes: &AxisFrame, now: Instant) -> bool {
        if self.timer.is_cooling_down(now) {
            return false;
        }

        let threshold = self.trigger_threshold.value();
        let all_active = self.spec.requirements.iter().all(|requirement| match requirement {
            Requirement::Button(button) => buttons.is_active(*button),
            Requirement::Trigger(trigger) => axes.trigger(*trigger) >= threshold,
        });
        if !all_active {
            return false;
        }

        debug!("Combination {} matched", self.spec);
        self.timer.fire(now);
        true
    }
}
