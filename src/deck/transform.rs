/// Offset transform: where a card sits in the 3-D stack
///
/// A card's pose depends only on its signed distance from the focused card
/// and on the deletion choreography flags. The function is pure; the
/// rendering layer interpolates towards the returned target using the
/// attached timing hint.

use std::time::Duration;

use crate::config::LayoutConfig;

const SCALE_STEP: f32 = 0.1;
const MIN_SCALE: f32 = 0.1;
const ROTATE_STEP_DEG: f32 = 8.0;
const DEPTH_STEP: f32 = 100.0;
const VERTICAL_LIFT: f32 = -20.0;
const BASE_Z_INDEX: i32 = 50;
const DELETING_Z_INDEX: i32 = 100;
const DELETING_DEPTH: f32 = 100.0;
const NEIGHBOR_OPACITY: f32 = 0.6;
/// Cards further away than this are fully transparent
const VISIBLE_RADIUS: i32 = 2;

/// Easing curve for duration-based transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t ∈ [0, 1]` onto the curve
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
        }
    }
}

/// How the renderer should move a card to its new target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Timing {
    /// Damped spring, integrated per frame
    Spring { stiffness: f32, damping: f32, mass: f32 },
    /// Fixed-duration curve, starting after `delay`
    Eased {
        duration: Duration,
        delay: Duration,
        easing: Easing,
    },
    /// Jump straight to the target
    Instant,
}

impl Timing {
    /// The default card motion
    pub const SPRING: Timing = Timing::Spring {
        stiffness: 260.0,
        damping: 20.0,
        mass: 1.0,
    };

    /// Slow arrival of the card that fills a deleted card's slot; the delay
    /// lets the fragments clear out first
    pub const ARRIVAL: Timing = Timing::Eased {
        duration: Duration::from_millis(800),
        delay: Duration::from_millis(200),
        easing: Easing::EaseInOut,
    };
}

/// Target pose of one card
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardTransform {
    /// Horizontal translation in px, positive to the right
    pub x: f32,
    /// Vertical translation in px
    pub y: f32,
    /// Depth translation in px, positive towards the viewer
    pub z: f32,
    pub scale: f32,
    /// Yaw in degrees
    pub rotate_y: f32,
    pub opacity: f32,
    /// Paint order, higher on top
    pub z_index: i32,
    pub timing: Timing,
}

/// Everything the transform depends on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformInput {
    /// Signed distance from the focused index
    pub offset: i32,
    /// A disintegration is visibly running
    pub deleting: bool,
    /// The card being deleted is the oldest real card
    pub oldest_card_deletion: bool,
    /// This card slides into the slot being vacated
    pub incoming_neighbor: bool,
    /// The card being deleted is the only card left
    pub sole_card_deletion: bool,
    pub viewport_width: f32,
}

impl TransformInput {
    /// Input for a card outside any deletion
    pub fn resting(offset: i32, viewport_width: f32) -> Self {
        Self {
            offset,
            deleting: false,
            oldest_card_deletion: false,
            incoming_neighbor: false,
            sole_card_deletion: false,
            viewport_width,
        }
    }
}

/// Compute the target transform of a card.
pub fn card_transform(input: &TransformInput, layout: &LayoutConfig) -> CardTransform {
    let spacing = layout.spacing(input.viewport_width);

    // The incoming card takes its post-compaction pose right away
    if input.deleting && input.incoming_neighbor {
        let settled = card_transform(&TransformInput::resting(0, input.viewport_width), layout);
        return CardTransform {
            timing: Timing::ARRIVAL,
            ..settled
        };
    }

    let offset = input.offset;
    let distance = offset.abs();
    let is_current = offset == 0;
    let deleting_current = input.deleting && is_current;

    // While deleting, the compacting side shifts one slot towards the centre
    let slot = if input.deleting && input.oldest_card_deletion && offset < 0 {
        offset + 1
    } else if input.deleting && !input.oldest_card_deletion && offset > 0 {
        offset - 1
    } else {
        offset
    };
    let x = -(slot as f32) * spacing;

    let scale = (1.0 - distance as f32 * SCALE_STEP).max(MIN_SCALE);
    let rotate_y = offset as f32 * ROTATE_STEP_DEG;

    let z = if deleting_current {
        DELETING_DEPTH
    } else {
        -(distance as f32) * DEPTH_STEP
    };

    let z_index = if deleting_current {
        DELETING_Z_INDEX
    } else {
        BASE_Z_INDEX - distance
    };

    let mut opacity = if distance > VISIBLE_RADIUS {
        0.0
    } else if is_current {
        if input.deleting {
            0.0
        } else {
            1.0
        }
    } else {
        NEIGHBOR_OPACITY
    };

    let hide_instantly = input.deleting && input.sole_card_deletion && !is_current;
    if hide_instantly {
        opacity = 0.0;
    }

    let timing = if deleting_current || hide_instantly {
        Timing::Instant
    } else {
        Timing::SPRING
    };

    CardTransform {
        x,
        y: VERTICAL_LIFT,
        z,
        scale,
        rotate_y,
        opacity,
        z_index,
        timing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDE: f32 = 1280.0;

    fn resting(offset: i32) -> CardTransform {
        card_transform(&TransformInput::resting(offset, WIDE), &LayoutConfig::default())
    }

    fn deleting(offset: i32, oldest: bool, incoming: bool) -> CardTransform {
        let input = TransformInput {
            offset,
            deleting: true,
            oldest_card_deletion: oldest,
            incoming_neighbor: incoming,
            sole_card_deletion: false,
            viewport_width: WIDE,
        };
        card_transform(&input, &LayoutConfig::default())
    }

    #[test]
    fn test_transform_is_pure() {
        for offset in -3..=3 {
            for flags in 0..8 {
                let input = TransformInput {
                    offset,
                    deleting: flags & 1 != 0,
                    oldest_card_deletion: flags & 2 != 0,
                    incoming_neighbor: flags & 4 != 0,
                    sole_card_deletion: false,
                    viewport_width: WIDE,
                };
                let layout = LayoutConfig::default();
                assert_eq!(card_transform(&input, &layout), card_transform(&input, &layout));
            }
        }
    }

    #[test]
    fn test_resting_fan() {
        let center = resting(0);
        assert_eq!((center.x, center.scale, center.rotate_y), (0.0, 1.0, 0.0));
        assert_eq!((center.opacity, center.z_index), (1.0, 50));

        let older = resting(1);
        assert_eq!(older.x, -260.0);
        assert!((older.scale - 0.9).abs() < 1e-6);
        assert_eq!(older.rotate_y, 8.0);
        assert_eq!(older.z, -100.0);
        assert_eq!(older.opacity, 0.6);
        assert_eq!(older.z_index, 49);

        let newer = resting(-1);
        assert_eq!(newer.x, 260.0);
        assert_eq!(newer.rotate_y, -8.0);

        assert_eq!(resting(3).opacity, 0.0);
    }

    #[test]
    fn test_scale_has_a_floor() {
        assert_eq!(resting(40).scale, MIN_SCALE);
    }

    #[test]
    fn test_narrow_viewport_uses_tighter_spacing() {
        let t = card_transform(&TransformInput::resting(1, 400.0), &LayoutConfig::default());
        assert_eq!(t.x, -220.0);
    }

    #[test]
    fn test_deleting_card_is_on_top_and_instant() {
        let t = deleting(0, false, false);
        assert_eq!(t.z_index, 100);
        assert_eq!(t.z, 100.0);
        assert_eq!(t.opacity, 0.0);
        assert_eq!(t.timing, Timing::Instant);
    }

    #[test]
    fn test_middle_deletion_shifts_older_side() {
        // Older card beyond the incoming one moves one slot in
        assert_eq!(deleting(2, false, false).x, -260.0);
        // Newer side stays put
        assert_eq!(deleting(-1, false, false).x, 260.0);
    }

    #[test]
    fn test_oldest_deletion_shifts_newer_side() {
        assert_eq!(deleting(-2, true, false).x, 260.0);
        // Sentinel side stays put
        assert_eq!(deleting(1, true, false).x, -260.0);
    }

    #[test]
    fn test_incoming_neighbor_takes_centre_pose_slowly() {
        let t = deleting(-1, true, true);
        let centre = resting(0);
        assert_eq!((t.x, t.y, t.z), (centre.x, centre.y, centre.z));
        assert_eq!((t.scale, t.rotate_y, t.opacity), (1.0, 0.0, 1.0));
        assert_eq!(t.z_index, centre.z_index);
        assert_eq!(t.timing, Timing::ARRIVAL);
    }

    #[test]
    fn test_sole_card_deletion_hides_others() {
        let input = TransformInput {
            offset: 1,
            deleting: true,
            oldest_card_deletion: true,
            incoming_neighbor: false,
            sole_card_deletion: true,
            viewport_width: WIDE,
        };
        let t = card_transform(&input, &LayoutConfig::default());
        assert_eq!(t.opacity, 0.0);
        assert_eq!(t.timing, Timing::Instant);
    }

    #[test]
    fn test_easing_endpoints() {
        let easing = Easing::EaseInOut;
        assert_eq!(easing.apply(0.0), 0.0);
        assert!((easing.apply(1.0) - 1.0).abs() < 1e-6);
        assert!((easing.apply(0.5) - 0.5).abs() < 1e-6);
        assert!(easing.apply(0.25) < 0.25);
    }
}
