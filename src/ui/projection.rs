/// Perspective projection of card poses onto the stage
use iced::{Point, Rectangle, Size, Vector};

use crate::deck::CardTransform;

/// Distance from the viewer to the stage plane, in px
pub const PERSPECTIVE: f32 = 1200.0;

/// A card projected onto the stage.
///
/// Corners run clockwise from the top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Point; 4],
    /// Perspective magnification at the card centre
    pub depth_scale: f32,
}

impl Quad {
    /// Project a card of size `card` whose pose is `transform`, with the
    /// stage origin (untransformed card centre) at `origin`.
    ///
    /// Returns `None` if any corner ends up behind the viewer.
    pub fn project(transform: &CardTransform, card: Size, origin: Point) -> Option<Self> {
        let (sin, cos) = transform.rotate_y.to_radians().sin_cos();
        let half_w = card.width / 2.0;
        let half_h = card.height / 2.0;
        let local = [(-half_w, -half_h), (half_w, -half_h), (half_w, half_h), (-half_w, half_h)];

        let mut corners = [Point::ORIGIN; 4];
        for (corner, (lx, ly)) in corners.iter_mut().zip(local) {
            let x = lx * transform.scale;
            let y = ly * transform.scale;

            // Yaw about the card's vertical axis
            let rx = x * cos;
            let rz = -x * sin;

            let wx = rx + transform.x;
            let wy = y + transform.y;
            let wz = rz + transform.z;

            let factor = perspective_factor(wz)?;
            *corner = Point::new(origin.x + wx * factor, origin.y + wy * factor);
        }

        Some(Self {
            corners,
            depth_scale: perspective_factor(transform.z)?,
        })
    }

    /// An unrotated card filling `rect`
    pub fn flat(rect: Rectangle) -> Self {
        let (left, top) = (rect.x, rect.y);
        let (right, bottom) = (rect.x + rect.width, rect.y + rect.height);
        Self {
            corners: [
                Point::new(left, top),
                Point::new(right, top),
                Point::new(right, bottom),
                Point::new(left, bottom),
            ],
            depth_scale: 1.0,
        }
    }

    /// Map card-local unit coordinates (`u`, `v` in `[0, 1]`) onto the quad
    pub fn lerp(&self, u: f32, v: f32) -> Point {
        let [tl, tr, br, bl] = self.corners;
        let top = tl + (tr - tl) * u;
        let bottom = bl + (br - bl) * u;
        top + (bottom - top) * v
    }

    pub fn center(&self) -> Point {
        self.lerp(0.5, 0.5)
    }

    /// Axis-aligned bounding box
    pub fn bounds(&self) -> Rectangle {
        let xs = self.corners.map(|p| p.x);
        let ys = self.corners.map(|p| p.y);
        let min_x = xs.iter().copied().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().copied().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        Rectangle::new(Point::new(min_x, min_y), Size::new(max_x - min_x, max_y - min_y))
    }

    /// Point-in-quad test for a convex quad
    pub fn contains(&self, point: Point) -> bool {
        let mut sign = 0.0_f32;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            let cross = cross(b - a, point - a);
            if cross == 0.0 {
                continue;
            }
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        true
    }
}

fn perspective_factor(z: f32) -> Option<f32> {
    let distance = PERSPECTIVE - z;
    (distance > f32::EPSILON).then(|| PERSPECTIVE / distance)
}

fn cross(a: Vector, b: Vector) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Pick the topmost item under `point`; higher paint order wins
pub fn topmost<T: Copy>(items: &[(T, i32, Quad)], point: Point) -> Option<T> {
    items
        .iter()
        .filter(|(_, _, quad)| quad.contains(point))
        .max_by_key(|(_, z_index, _)| *z_index)
        .map(|(item, _, _)| *item)
}
