/// Render-side interpolation of card poses
///
/// The deck hands out target transforms with a timing hint; this bank
/// animates each mounted slot from wherever it currently is towards its
/// latest target. Slots are keyed by `SlotKey`, so a card keeps its motion
/// when its index shifts after a deletion.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::deck::transform::{CardTransform, Easing, Timing};
use crate::deck::{RenderSlot, SlotKey};

const CHANNELS: usize = 6;
/// Spring integration step; smaller steps keep stiff springs stable
const SPRING_SUBSTEP: f32 = 1.0 / 240.0;
/// Longest frame gap integrated at once (e.g. after the window was hidden)
const MAX_FRAME_DT: f32 = 1.0 / 15.0;
const REST_DELTA: f32 = 0.01;

type Channels = [f32; CHANNELS];

fn pose(t: &CardTransform) -> Channels {
    [t.x, t.y, t.z, t.scale, t.rotate_y, t.opacity]
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Settled,
    Spring {
        stiffness: f32,
        damping: f32,
        mass: f32,
    },
    Eased {
        from: Channels,
        start: Instant,
        delay: Duration,
        duration: Duration,
        easing: Easing,
    },
}

#[derive(Debug, Clone)]
struct Animated {
    current: Channels,
    velocity: Channels,
    target: CardTransform,
    motion: Motion,
}

impl Animated {
    fn settled(target: CardTransform) -> Self {
        Self {
            current: pose(&target),
            velocity: [0.0; CHANNELS],
            target,
            motion: Motion::Settled,
        }
    }

    fn retarget(&mut self, target: CardTransform, now: Instant) {
        let moved = pose(&self.target) != pose(&target);
        self.target = target;
        if !moved {
            return;
        }

        self.motion = match target.timing {
            Timing::Instant => {
                self.current = pose(&target);
                self.velocity = [0.0; CHANNELS];
                Motion::Settled
            }
            Timing::Spring {
                stiffness,
                damping,
                mass,
            } => Motion::Spring {
                stiffness,
                damping,
                mass: mass.max(f32::EPSILON),
            },
            Timing::Eased {
                duration,
                delay,
                easing,
            } => {
                self.velocity = [0.0; CHANNELS];
                Motion::Eased {
                    from: self.current,
                    start: now,
                    delay,
                    duration,
                    easing,
                }
            }
        };
    }

    fn advance(&mut self, now: Instant, dt: f32) {
        let goal = pose(&self.target);
        match self.motion {
            Motion::Settled => {}
            Motion::Spring {
                stiffness,
                damping,
                mass,
            } => {
                let mut remaining = dt;
                while remaining > 0.0 {
                    let h = remaining.min(SPRING_SUBSTEP);
                    for i in 0..CHANNELS {
                        let force = -stiffness * (self.current[i] - goal[i]) - damping * self.velocity[i];
                        self.velocity[i] += force / mass * h;
                        self.current[i] += self.velocity[i] * h;
                    }
                    remaining -= h;
                }

                let at_rest = (0..CHANNELS).all(|i| {
                    (self.current[i] - goal[i]).abs() < REST_DELTA && self.velocity[i].abs() < REST_DELTA
                });
                if at_rest {
                    self.current = goal;
                    self.velocity = [0.0; CHANNELS];
                    self.motion = Motion::Settled;
                }
            }
            Motion::Eased {
                from,
                start,
                delay,
                duration,
                easing,
            } => {
                let elapsed = now.saturating_duration_since(start);
                if elapsed < delay {
                    return;
                }
                let progress = if duration.is_zero() {
                    1.0
                } else {
                    (elapsed - delay).as_secs_f32() / duration.as_secs_f32()
                };
                let eased = easing.apply(progress);
                for i in 0..CHANNELS {
                    self.current[i] = from[i] + (goal[i] - from[i]) * eased;
                }
                if progress >= 1.0 {
                    self.current = goal;
                    self.motion = Motion::Settled;
                }
            }
        }
    }

    fn transform(&self) -> CardTransform {
        let [x, y, z, scale, rotate_y, opacity] = self.current;
        CardTransform {
            x,
            y,
            z,
            scale,
            rotate_y,
            opacity: opacity.clamp(0.0, 1.0),
            ..self.target
        }
    }
}

/// Animated poses of every mounted slot
#[derive(Debug, Default)]
pub struct TweenBank {
    entries: HashMap<SlotKey, Animated>,
    last_tick: Option<Instant>,
}

impl TweenBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point every slot at its latest target.
    ///
    /// New slots appear at their target without animating in; slots missing
    /// from `slots` are unmounted.
    pub fn sync(&mut self, slots: &[RenderSlot], now: Instant) {
        self.entries
            .retain(|key, _| slots.iter().any(|slot| slot.key == *key));

        for slot in slots {
            match self.entries.get_mut(&slot.key) {
                Some(animated) => animated.retarget(slot.transform, now),
                None => {
                    self.entries
                        .insert(slot.key, Animated::settled(slot.transform));
                }
            }
        }
    }

    /// Advance every animation to `now`
    pub fn tick(&mut self, now: Instant) {
        let dt = match self.last_tick {
            Some(last) => now.saturating_duration_since(last).as_secs_f32().min(MAX_FRAME_DT),
            None => 0.0,
        };
        self.last_tick = Some(now);

        for animated in self.entries.values_mut() {
            animated.advance(now, dt);
        }
    }

    /// Current pose of a slot
    pub fn current(&self, key: &SlotKey) -> Option<CardTransform> {
        self.entries.get(key).map(Animated::transform)
    }

    pub fn is_settled(&self) -> bool {
        self.entries
            .values()
            .all(|animated| matches!(animated.motion, Motion::Settled))
    }

    /// Forget the frame clock so the next tick does not integrate a long gap
    pub fn pause(&mut self) {
        self.last_tick = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::deck::transform::{card_transform, TransformInput};
    use crate::deck::SlotRole;

    fn slot(key: SlotKey, offset: i32) -> RenderSlot {
        RenderSlot {
            key,
            index: offset as isize,
            offset,
            role: SlotRole::Neighbor,
            transform: card_transform(&TransformInput::resting(offset, 1280.0), &LayoutConfig::default()),
        }
    }

    fn run(bank: &mut TweenBank, start: Instant, millis: u64) -> Instant {
        let mut now = start;
        for _ in 0..(millis / 16) {
            now += Duration::from_millis(16);
            bank.tick(now);
        }
        now
    }

    #[test]
    fn test_new_slots_appear_at_target() {
        let mut bank = TweenBank::new();
        let s = slot(SlotKey::NewestBoundary, 1);
        bank.sync(&[s], Instant::now());
        assert_eq!(bank.current(&s.key), Some(s.transform));
        assert!(bank.is_settled());
    }

    #[test]
    fn test_spring_converges() {
        let mut bank = TweenBank::new();
        let t0 = Instant::now();
        bank.sync(&[slot(SlotKey::OldestBoundary, 1)], t0);
        bank.tick(t0);

        let moved = slot(SlotKey::OldestBoundary, 0);
        bank.sync(&[moved], t0);
        assert!(!bank.is_settled());

        let t1 = run(&mut bank, t0, 100);
        let midway = bank.current(&moved.key).unwrap();
        assert!(midway.x > -260.0 && midway.x != 0.0);

        run(&mut bank, t1, 3_000);
        assert!(bank.is_settled());
        assert_eq!(bank.current(&moved.key).unwrap().x, 0.0);
    }

    #[test]
    fn test_eased_waits_for_delay() {
        let mut bank = TweenBank::new();
        let key = SlotKey::OldestBoundary;
        let t0 = Instant::now();
        bank.sync(&[slot(key, -1)], t0);
        bank.tick(t0);

        let mut arriving = slot(key, 0);
        arriving.transform.timing = Timing::ARRIVAL;
        bank.sync(&[arriving], t0);

        bank.tick(t0 + Duration::from_millis(150));
        assert_eq!(bank.current(&key).unwrap().x, 260.0);

        bank.tick(t0 + Duration::from_millis(600));
        let x = bank.current(&key).unwrap().x;
        assert!(x < 260.0 && x > 0.0);

        bank.tick(t0 + Duration::from_millis(1_000));
        assert_eq!(bank.current(&key).unwrap().x, 0.0);
        assert!(bank.is_settled());
    }

    #[test]
    fn test_same_pose_new_timing_keeps_running_motion() {
        let mut bank = TweenBank::new();
        let key = SlotKey::NewestBoundary;
        let t0 = Instant::now();
        bank.sync(&[slot(key, -1)], t0);

        let mut arriving = slot(key, 0);
        arriving.transform.timing = Timing::ARRIVAL;
        bank.sync(&[arriving], t0);
        bank.tick(t0);
        bank.tick(t0 + Duration::from_millis(500));
        let before = bank.current(&key).unwrap().x;

        // The deletion commits: same pose, default timing
        bank.sync(&[slot(key, 0)], t0 + Duration::from_millis(500));
        assert_eq!(bank.current(&key).unwrap().x, before);
        bank.tick(t0 + Duration::from_millis(1_000));
        assert_eq!(bank.current(&key).unwrap().x, 0.0);
    }

    #[test]
    fn test_instant_jumps() {
        let mut bank = TweenBank::new();
        let key = SlotKey::Empty;
        let t0 = Instant::now();
        bank.sync(&[slot(key, 0)], t0);

        let mut hidden = slot(key, 0);
        hidden.transform.opacity = 0.0;
        hidden.transform.timing = Timing::Instant;
        bank.sync(&[hidden], t0);
        assert_eq!(bank.current(&key).unwrap().opacity, 0.0);
        assert!(bank.is_settled());
    }

    #[test]
    fn test_unmounted_slots_are_dropped() {
        let mut bank = TweenBank::new();
        let t0 = Instant::now();
        bank.sync(&[slot(SlotKey::NewestBoundary, -1), slot(SlotKey::Empty, 0)], t0);
        bank.sync(&[slot(SlotKey::Empty, 0)], t0);
        assert!(bank.current(&SlotKey::NewestBoundary).is_none());
        assert!(bank.current(&SlotKey::Empty).is_some());
    }
}
