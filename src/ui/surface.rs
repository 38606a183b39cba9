/// On-screen card surfaces backed by window screenshots
///
/// The stage fills the window, so stage coordinates are logical window
/// coordinates. A screenshot is taken in physical pixels; the crop scales the
/// card rectangle by the ratio between the two.
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::DeckError;
use crate::snap::{CaptureError, Surface, SurfaceRect};

/// Whether the focused card is painted, shared between the stage and the
/// surface handed to the disintegration engine
#[derive(Debug, Clone)]
pub struct SurfaceVisibility(Arc<AtomicBool>);

impl SurfaceVisibility {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::Relaxed);
    }
}

impl Default for SurfaceVisibility {
    fn default() -> Self {
        Self::new()
    }
}

/// A raw RGBA frame of the whole window
#[derive(Debug, Clone)]
pub struct WindowFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Physical pixels per logical pixel
    pub scale: f32,
}

impl WindowFrame {
    pub fn from_screenshot(screenshot: &iced::window::Screenshot, logical_width: f32) -> Self {
        let width = screenshot.size.width;
        let scale = if logical_width > 0.0 {
            width as f32 / logical_width
        } else {
            1.0
        };
        Self {
            pixels: screenshot.as_ref().to_vec(),
            width,
            height: screenshot.size.height,
            scale,
        }
    }

    /// Cut `rect` (logical px) out of the frame
    pub fn crop(self, rect: SurfaceRect) -> Result<RgbaImage, CaptureError> {
        if rect.is_empty() {
            return Err(CaptureError::EmptySurface);
        }
        let (width, height, scale) = (self.width, self.height, self.scale);
        let frame = RgbaImage::from_raw(width, height, self.pixels).ok_or_else(|| {
            CaptureError::Backend(format!("screenshot buffer does not match {width}x{height}"))
        })?;

        let x = (rect.x * scale).round().max(0.0) as u32;
        let y = (rect.y * scale).round().max(0.0) as u32;
        if x >= width || y >= height {
            return Err(CaptureError::Backend("card is outside the window".to_string()));
        }
        let w = ((rect.width * scale).round() as u32).min(width - x);
        let h = ((rect.height * scale).round() as u32).min(height - y);
        if w == 0 || h == 0 {
            return Err(CaptureError::EmptyBitmap);
        }

        Ok(imageops::crop_imm(&frame, x, y, w, h).to_image())
    }

    /// Cut `rect` out, resample it to `width`x`height` and round its corners
    pub fn crop_resized(
        self,
        rect: SurfaceRect,
        (width, height): (u32, u32),
        radius: f32,
    ) -> Result<RgbaImage, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyBitmap);
        }
        let cropped = self.crop(rect)?;
        let mut bitmap = if cropped.dimensions() == (width, height) {
            cropped
        } else {
            imageops::resize(&cropped, width, height, FilterType::Lanczos3)
        };
        mask_rounded_corners(&mut bitmap, radius);
        Ok(bitmap)
    }
}

/// Clear everything outside the card's rounded corners
pub fn mask_rounded_corners(bitmap: &mut RgbaImage, radius: f32) {
    let (width, height) = bitmap.dimensions();
    let radius = radius.min(width as f32 / 2.0).min(height as f32 / 2.0);
    if radius <= 0.0 {
        return;
    }

    for (x, y, pixel) in bitmap.enumerate_pixels_mut() {
        // Sample at the pixel centre
        let px = x as f32 + 0.5;
        let py = y as f32 + 0.5;
        let cx = px.clamp(radius, width as f32 - radius);
        let cy = py.clamp(radius, height as f32 - radius);
        let (dx, dy) = (px - cx, py - cy);
        if dx * dx + dy * dy > radius * radius {
            *pixel = Rgba([0, 0, 0, 0]);
        }
    }
}

/// Write a captured card as PNG, whatever extension the user typed
pub fn save_png(bitmap: &RgbaImage, path: &Path) -> Result<(), DeckError> {
    bitmap.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// The focused card as captured at the moment a deletion started
#[derive(Debug)]
pub struct CardSurface {
    rect: SurfaceRect,
    bitmap: Result<RgbaImage, CaptureError>,
    visibility: SurfaceVisibility,
}

impl CardSurface {
    pub fn new(
        rect: SurfaceRect,
        bitmap: Result<RgbaImage, CaptureError>,
        visibility: SurfaceVisibility,
    ) -> Self {
        Self {
            rect,
            bitmap,
            visibility,
        }
    }
}

impl Surface for CardSurface {
    fn bounds(&self) -> SurfaceRect {
        self.rect
    }

    fn rasterize(&self) -> Result<RgbaImage, CaptureError> {
        self.bitmap.clone()
    }

    fn set_visible(&mut self, visible: bool) {
        self.visibility.set(visible);
    }
}
