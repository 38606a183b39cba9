/// Gesture normalization
///
/// Turns drag releases, horizontal wheel deltas and card taps into discrete
/// navigation commands. Drag elasticity is presentation only and never
/// changes which command a release produces.

use std::time::{Duration, Instant};

use crate::config::GestureConfig;

/// Discrete navigation command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Move focus towards the oldest end
    Advance,
    /// Move focus towards the newest end
    Retreat,
    /// Focus a visible, non-focused card directly
    JumpTo(isize),
}

/// Classify a drag release.
///
/// Dragging right (positive offset) reveals older cards.
pub fn drag_release(offset_x: f32, velocity_x: f32, config: &GestureConfig) -> Option<Command> {
    if offset_x > config.swipe_distance || velocity_x > config.swipe_velocity {
        Some(Command::Advance)
    } else if offset_x < -config.swipe_distance || velocity_x < -config.swipe_velocity {
        Some(Command::Retreat)
    } else {
        None
    }
}

/// Selecting a card other than the focused one jumps to it
pub fn select(index: isize, focused: isize) -> Option<Command> {
    (index != focused).then_some(Command::JumpTo(index))
}

/// Rate limiter that turns continuous trackpad scrolling into single steps
#[derive(Debug, Clone)]
pub struct WheelGate {
    threshold: f32,
    cooldown: Duration,
    last_step: Option<Instant>,
}

impl WheelGate {
    pub fn new(config: &GestureConfig) -> Self {
        Self {
            threshold: config.wheel_threshold,
            cooldown: Duration::from_millis(config.wheel_cooldown_ms),
            last_step: None,
        }
    }

    /// Feed one horizontal wheel delta.
    ///
    /// Scrolling right (positive delta) moves towards newer cards. Only
    /// accepted steps restart the cooldown.
    pub fn on_wheel(&mut self, delta_x: f32, now: Instant) -> Option<Command> {
        if let Some(last) = self.last_step {
            if now.saturating_duration_since(last) < self.cooldown {
                return None;
            }
        }

        if delta_x.abs() <= self.threshold {
            return None;
        }

        self.last_step = Some(now);
        if delta_x > 0.0 {
            Some(Command::Retreat)
        } else {
            Some(Command::Advance)
        }
    }
}

/// How far a drag visually follows the pointer in each direction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Elasticity {
    pub left: f32,
    pub right: f32,
}

impl Elasticity {
    const NORMAL: f32 = 0.2;
    const RESISTANT: f32 = 0.05;

    /// Elasticity of the card at a virtual index in a deck of `len` cards.
    ///
    /// The sentinels resist being pulled further past the boundary.
    pub fn for_index(index: isize, len: usize) -> Self {
        if index == -1 {
            Self {
                left: Self::NORMAL,
                right: Self::RESISTANT,
            }
        } else if index == len as isize {
            Self {
                left: Self::RESISTANT,
                right: Self::NORMAL,
            }
        } else {
            Self {
                left: Self::NORMAL,
                right: Self::NORMAL,
            }
        }
    }

    /// On-screen displacement for a raw drag distance
    pub fn apply(&self, dx: f32) -> f32 {
        if dx >= 0.0 {
            dx * self.right
        } else {
            dx * self.left
        }
    }
}
