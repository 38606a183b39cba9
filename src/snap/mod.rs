/// Disintegration effect
///
/// Captures a card as a bitmap, breaks it into a grid of tinted fragments,
/// and lets the fragments drift up and fade out. The caller drives the
/// simulation with one `step` per frame and draws the particles on an
/// overlay larger than the card, so fragments can leave its bounds.
///
/// Guarantees:
/// - The completion notifier fires at most once, whether the animation ran
///   to the end or capture failed
/// - The card surface is hidden only while fragments stand in for it and is
///   shown again on cancel or drop
/// - A capture failure completes immediately

pub mod particle;
pub mod rng;

use cgmath::Vector2;
use image::RgbaImage;
use thiserror::Error;

use crate::config::SnapConfig;
use particle::Particle;
use rng::RandomSource;

/// Screen rectangle of a surface, in stage coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SurfaceRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("surface has no area")]
    EmptySurface,

    #[error("captured bitmap is empty")]
    EmptyBitmap,

    #[error("fragment grid has no cells")]
    EmptyGrid,

    #[error("{0}")]
    Backend(String),
}

/// A card as seen by the effect: where it is, what it looks like, and a way
/// to hide it while the fragments stand in for it.
pub trait Surface {
    fn bounds(&self) -> SurfaceRect;
    fn rasterize(&self) -> Result<RgbaImage, CaptureError>;
    fn set_visible(&mut self, visible: bool);
}

/// Callback fired once when the effect is over
pub struct CompletionNotifier(Option<Box<dyn FnOnce()>>);

impl CompletionNotifier {
    pub fn new(on_complete: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(on_complete)))
    }

    /// Returns false if it had already fired
    fn fire(&mut self) -> bool {
        match self.0.take() {
            Some(on_complete) => {
                on_complete();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CompletionNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CompletionNotifier")
            .field(&if self.0.is_some() { "armed" } else { "fired" })
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum StartOutcome {
    Running { particles: usize },
    /// Capture failed; completion has already been signalled
    Fallback(CaptureError),
    AlreadyStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Running { live: usize },
    /// The last fragment faded on this step
    Completed,
    /// Not running; nothing happened
    Inactive,
}

/// Drawing area for the fragments: the card bounds plus padding on every side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overlay {
    /// Stage position of the overlay's top-left corner
    pub origin: Vector2<f32>,
    pub size: Vector2<f32>,
}

/// One disintegration run against one surface
pub struct Disintegration<S: Surface, R: RandomSource> {
    surface: S,
    rng: R,
    config: SnapConfig,
    notifier: CompletionNotifier,
    particles: Vec<Particle>,
    overlay: Option<Overlay>,
    state: EngineState,
    surface_hidden: bool,
}

impl<S: Surface, R: RandomSource> Disintegration<S, R> {
    pub fn new(surface: S, rng: R, config: SnapConfig, notifier: CompletionNotifier) -> Self {
        Self {
            surface,
            rng,
            config,
            notifier,
            particles: Vec::new(),
            overlay: None,
            state: EngineState::Idle,
            surface_hidden: false,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    /// Capture the surface and spawn the fragments.
    pub fn start(&mut self) -> StartOutcome {
        if self.state != EngineState::Idle {
            return StartOutcome::AlreadyStarted;
        }

        match self.shatter() {
            Ok((overlay, particles)) => {
                let count = particles.len();
                self.overlay = Some(overlay);
                self.particles = particles;
                self.set_surface_hidden(true);
                self.state = EngineState::Running;
                log::debug!("💥 Disintegrating into {count} fragments");
                StartOutcome::Running { particles: count }
            }
            Err(err) => {
                log::warn!("disintegration capture failed, completing anyway: {err}");
                self.state = EngineState::Completed;
                self.notifier.fire();
                StartOutcome::Fallback(err)
            }
        }
    }

    fn shatter(&mut self) -> Result<(Overlay, Vec<Particle>), CaptureError> {
        let bounds = self.surface.bounds();
        if bounds.is_empty() {
            return Err(CaptureError::EmptySurface);
        }
        if self.config.columns == 0 || self.config.rows == 0 {
            return Err(CaptureError::EmptyGrid);
        }

        let bitmap = self.surface.rasterize()?;
        if bitmap.width() == 0 || bitmap.height() == 0 {
            return Err(CaptureError::EmptyBitmap);
        }

        let padding = self.config.padding;
        let overlay = Overlay {
            origin: Vector2::new(bounds.x - padding, bounds.y - padding),
            size: Vector2::new(bounds.width + padding * 2.0, bounds.height + padding * 2.0),
        };

        let cell = Vector2::new(
            bounds.width / self.config.columns as f32,
            bounds.height / self.config.rows as f32,
        );
        // The bitmap may be captured at a different pixel density
        let scale_x = bitmap.width() as f32 / bounds.width;
        let scale_y = bitmap.height() as f32 / bounds.height;

        let mut particles = Vec::new();
        for column in 0..self.config.columns {
            for row in 0..self.config.rows {
                let x = column as f32 * cell.x;
                let y = row as f32 * cell.y;

                let sample_x = ((x + cell.x / 2.0) * scale_x).floor() as u32;
                let sample_y = ((y + cell.y / 2.0) * scale_y).floor() as u32;
                if sample_x >= bitmap.width() || sample_y >= bitmap.height() {
                    continue;
                }

                let tint = *bitmap.get_pixel(sample_x, sample_y);
                if tint.0[3] <= self.config.alpha_threshold {
                    continue;
                }

                particles.push(Particle::spawn(
                    Vector2::new(x + padding, y + padding),
                    cell,
                    tint,
                    &mut self.rng,
                ));
            }
        }

        Ok((overlay, particles))
    }

    /// Advance the simulation by one frame.
    pub fn step(&mut self) -> StepOutcome {
        if self.state != EngineState::Running {
            return StepOutcome::Inactive;
        }

        if !self.particles.iter().any(Particle::is_alive) {
            self.particles.clear();
            self.state = EngineState::Completed;
            self.notifier.fire();
            log::debug!("disintegration finished");
            return StepOutcome::Completed;
        }

        let buoyancy = self.config.buoyancy;
        for particle in self.particles.iter_mut().filter(|p| p.is_alive()) {
            particle.step(buoyancy);
        }
        self.particles.retain(Particle::is_alive);

        StepOutcome::Running {
            live: self.particles.len(),
        }
    }

    /// Stop a running effect without signalling completion and show the
    /// surface again.
    pub fn cancel(&mut self) -> bool {
        if self.state != EngineState::Running {
            return false;
        }
        self.state = EngineState::Cancelled;
        self.particles.clear();
        self.set_surface_hidden(false);
        log::debug!("disintegration cancelled");
        true
    }

    fn set_surface_hidden(&mut self, hidden: bool) {
        if self.surface_hidden != hidden {
            self.surface.set_visible(!hidden);
            self.surface_hidden = hidden;
        }
    }
}

impl<S: Surface, R: RandomSource> Drop for Disintegration<S, R> {
    fn drop(&mut self) {
        self.set_surface_hidden(false);
    }
}

impl<S: Surface, R: RandomSource> std::fmt::Debug for Disintegration<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disintegration")
            .field("state", &self.state)
            .field("particles", &self.particles.len())
            .field("overlay", &self.overlay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use rng::XorShiftRng;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FixtureSurface {
        rect: SurfaceRect,
        bitmap: Option<RgbaImage>,
        visible: Rc<Cell<bool>>,
    }

    impl Surface for FixtureSurface {
        fn bounds(&self) -> SurfaceRect {
            self.rect
        }

        fn rasterize(&self) -> Result<RgbaImage, CaptureError> {
            self.bitmap
                .clone()
                .ok_or_else(|| CaptureError::Backend("not on screen".to_string()))
        }

        fn set_visible(&mut self, visible: bool) {
            self.visible.set(visible);
        }
    }

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]))
    }

    /// 100x100 card whose top-left quadrant is fully transparent
    fn quadrant_hole(scale: u32) -> RgbaImage {
        let size = 100 * scale;
        RgbaImage::from_fn(size, size, |x, y| {
            if x < size / 2 && y < size / 2 {
                Rgba([0, 0, 0, 0])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn grid(columns: u32, rows: u32) -> SnapConfig {
        SnapConfig {
            columns,
            rows,
            ..SnapConfig::default()
        }
    }

    struct Harness {
        engine: Disintegration<FixtureSurface, XorShiftRng>,
        visible: Rc<Cell<bool>>,
        fired: Rc<Cell<u32>>,
    }

    fn harness(bitmap: Option<RgbaImage>, rect: SurfaceRect, config: SnapConfig) -> Harness {
        let visible = Rc::new(Cell::new(true));
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let surface = FixtureSurface {
            rect,
            bitmap,
            visible: visible.clone(),
        };
        let engine = Disintegration::new(
            surface,
            XorShiftRng::with_seed(1234),
            config,
            CompletionNotifier::new(move || counter.set(counter.get() + 1)),
        );
        Harness {
            engine,
            visible,
            fired,
        }
    }

    fn card_rect() -> SurfaceRect {
        SurfaceRect::new(300.0, 120.0, 100.0, 100.0)
    }

    #[test]
    fn test_opaque_card_fills_the_grid() {
        let mut h = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        assert!(matches!(h.engine.start(), StartOutcome::Running { particles: 100 }));

        let mut h = harness(Some(opaque(100, 100)), card_rect(), SnapConfig::default());
        assert!(matches!(h.engine.start(), StartOutcome::Running { particles: 600 }));
    }

    #[test]
    fn test_transparent_quadrant_spawns_nothing() {
        for scale in [1, 2] {
            let mut h = harness(Some(quadrant_hole(scale)), card_rect(), grid(10, 10));
            assert!(matches!(h.engine.start(), StartOutcome::Running { particles: 75 }));

            let padding = SnapConfig::default().padding;
            let in_hole = h.engine.particles().iter().filter(|p| {
                p.position.x < padding + 50.0 && p.position.y < padding + 50.0
            });
            assert_eq!(in_hole.count(), 0);
        }
    }

    #[test]
    fn test_alpha_threshold_is_exclusive() {
        let faint = RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 20]));
        let mut h = harness(Some(faint), card_rect(), grid(2, 2));
        assert!(matches!(h.engine.start(), StartOutcome::Running { particles: 0 }));

        let visible = RgbaImage::from_pixel(10, 10, Rgba([9, 9, 9, 21]));
        let mut h = harness(Some(visible), card_rect(), grid(2, 2));
        assert!(matches!(h.engine.start(), StartOutcome::Running { particles: 4 }));
        assert_eq!(h.engine.particles()[0].tint, Rgba([9, 9, 9, 21]));
    }

    #[test]
    fn test_overlay_is_padded_card() {
        let mut h = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        h.engine.start();
        let overlay = h.engine.overlay().unwrap();
        assert_eq!(overlay.origin, Vector2::new(200.0, 20.0));
        assert_eq!(overlay.size, Vector2::new(300.0, 300.0));
    }

    #[test]
    fn test_runs_to_completion_exactly_once() {
        let mut h = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        h.engine.start();
        assert!(!h.visible.get());

        let mut steps = 0;
        loop {
            match h.engine.step() {
                StepOutcome::Running { .. } => steps += 1,
                StepOutcome::Completed => break,
                StepOutcome::Inactive => panic!("engine stopped early"),
            }
            assert_eq!(h.fired.get(), 0);
            assert!(steps < 1_000, "fragments never faded");
        }

        // Slowest decay is 0.01 per step
        assert!(steps <= 101);
        assert_eq!(h.fired.get(), 1);
        assert_eq!(h.engine.state(), EngineState::Completed);
        assert_eq!(h.engine.step(), StepOutcome::Inactive);
        assert_eq!(h.fired.get(), 1);
    }

    #[test]
    fn test_fragments_drift_upwards() {
        let mut h = harness(Some(opaque(100, 100)), card_rect(), grid(4, 4));
        h.engine.start();
        let before: Vec<f32> = h.engine.particles().iter().map(|p| p.position.y).collect();
        h.engine.step();
        h.engine.step();
        for (p, y0) in h.engine.particles().iter().zip(before) {
            assert!(p.position.y < y0);
        }
    }

    #[test]
    fn test_capture_failure_completes_immediately() {
        let mut h = harness(None, card_rect(), grid(10, 10));
        assert!(matches!(h.engine.start(), StartOutcome::Fallback(CaptureError::Backend(_))));
        assert_eq!(h.fired.get(), 1);
        assert!(h.visible.get());
        assert!(matches!(h.engine.start(), StartOutcome::AlreadyStarted));
        assert_eq!(h.fired.get(), 1);
    }

    #[test]
    fn test_zero_sized_surface_falls_back() {
        let rect = SurfaceRect::new(0.0, 0.0, 0.0, 50.0);
        let mut h = harness(Some(opaque(10, 10)), rect, grid(10, 10));
        assert!(matches!(h.engine.start(), StartOutcome::Fallback(CaptureError::EmptySurface)));
        assert_eq!(h.fired.get(), 1);
    }

    #[test]
    fn test_fully_transparent_card_completes_on_first_step() {
        let clear = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));
        let mut h = harness(Some(clear), card_rect(), grid(10, 10));
        h.engine.start();
        assert_eq!(h.engine.step(), StepOutcome::Completed);
        assert_eq!(h.fired.get(), 1);
    }

    #[test]
    fn test_cancel_restores_surface_without_completing() {
        let mut h = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        h.engine.start();
        h.engine.step();
        assert!(h.engine.cancel());
        assert!(h.visible.get());
        assert_eq!(h.fired.get(), 0);
        assert_eq!(h.engine.step(), StepOutcome::Inactive);
        assert!(!h.engine.cancel());
    }

    #[test]
    fn test_drop_mid_animation_restores_surface() {
        let h = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        let visible = h.visible.clone();
        let mut engine = h.engine;
        engine.start();
        assert!(!visible.get());
        drop(engine);
        assert!(visible.get());
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let mut a = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        let mut b = harness(Some(opaque(100, 100)), card_rect(), grid(10, 10));
        a.engine.start();
        b.engine.start();
        for _ in 0..10 {
            a.engine.step();
            b.engine.step();
        }
        assert_eq!(a.engine.particles(), b.engine.particles());
    }
}
