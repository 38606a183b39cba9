/// A single fragment of a disintegrating card

use cgmath::Vector2;
use image::Rgba;

use super::rng::RandomSource;

/// One simulated fragment.
///
/// Positions are in overlay coordinates (the card's top-left corner sits at
/// `(padding, padding)`).
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    /// Top-left corner of the fragment
    pub position: Vector2<f32>,
    pub size: Vector2<f32>,
    /// Displacement per step
    pub velocity: Vector2<f32>,
    /// Radians
    pub rotation: f32,
    /// Radians per step
    pub spin: f32,
    /// Colour sampled from the card, alpha included
    pub tint: Rgba<u8>,
    /// Remaining life; the fragment is drawn at this alpha
    pub life: f32,
    /// Life lost per step
    pub decay: f32,
}

impl Particle {
    /// Spawn a fragment with randomized drift, lift, spin and decay
    pub fn spawn(
        position: Vector2<f32>,
        size: Vector2<f32>,
        tint: Rgba<u8>,
        rng: &mut impl RandomSource,
    ) -> Self {
        let vx = (rng.next_f32() - 0.5) * 2.0;
        let vy = (rng.next_f32() - 1.0) * 2.0 - 1.0;
        let decay = rng.next_f32() * 0.02 + 0.01;
        let spin = (rng.next_f32() - 0.5) * 0.2;

        Self {
            position,
            size,
            velocity: Vector2::new(vx, vy),
            rotation: 0.0,
            spin,
            tint,
            life: 1.0,
            decay,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life > 0.0
    }

    /// Advance one step; `buoyancy` accelerates the fragment upwards
    pub fn step(&mut self, buoyancy: f32) {
        self.position += self.velocity;
        self.velocity.y -= buoyancy;
        self.rotation += self.spin;
        self.life -= self.decay;
    }

    /// Opacity to draw with
    pub fn alpha(&self) -> f32 {
        self.life.clamp(0.0, 1.0)
    }

    /// Centre of the fragment, the pivot for its rotation
    pub fn center(&self) -> Vector2<f32> {
        self.position + self.size / 2.0
    }
}
