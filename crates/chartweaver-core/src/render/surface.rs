//! Drawing surface: a per-call pixel buffer that becomes one PNG.
//!
//! Every render call creates its own surface and consumes it on encoding,
//! so no drawing state is shared between requests on any path. Text is
//! rendered through an embedded DejaVu Sans font registered with the
//! ab_glyph backend, so no system font installation is required.

use image::ImageEncoder;
use image::codecs::png::PngEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::register_font;

use crate::domain::PipelineError;

/// 10:6 キャンバス、300 DPI 相当（10in x 6in）
pub const CANVAS_WIDTH: u32 = 3000;
pub const CANVAS_HEIGHT: u32 = 1800;

static FONT_BYTES: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Register the embedded font once per process. Both the normal and bold
/// styles map to the same face; the title just renders heavier strokes.
fn ensure_fonts() -> Result<(), PipelineError> {
    use std::sync::OnceLock;
    static REGISTERED: OnceLock<Result<(), String>> = OnceLock::new();
    REGISTERED
        .get_or_init(|| {
            register_font("sans-serif", FontStyle::Normal, FONT_BYTES)
                .map_err(|_| "embedded font is not a valid TTF".to_string())?;
            register_font("sans-serif", FontStyle::Bold, FONT_BYTES)
                .map_err(|_| "embedded font is not a valid TTF".to_string())?;
            Ok(())
        })
        .clone()
        .map_err(PipelineError::Render)
}

/// One RGB canvas. Owns its buffer; nothing global.
pub struct DrawingSurface {
    width: u32,
    height: u32,
    buffer: Vec<u8>,
}

impl DrawingSurface {
    pub fn new(width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::Render(format!(
                "invalid canvas size {width}x{height}"
            )));
        }
        ensure_fonts()?;
        Ok(Self {
            width,
            height,
            buffer: vec![255u8; (width as usize) * (height as usize) * 3],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Borrow the buffer as a plotters drawing area. The borrow ends before
    /// encoding, which is what `into_png` taking `self` enforces.
    pub fn drawing_area(&mut self) -> DrawingArea<BitMapBackend<'_>, Shift> {
        BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height)).into_drawing_area()
    }

    /// Consume the surface into encoded PNG bytes (RGB, no alpha).
    pub fn into_png(self) -> Result<Vec<u8>, PipelineError> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out)
            .write_image(
                &self.buffer,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| PipelineError::Render(format!("PNG encoding failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_surface_encodes_to_a_valid_png() {
        let surface = DrawingSurface::new(40, 24).unwrap();
        let png = surface.into_png().unwrap();
        assert!(png.starts_with(b"\x89PNG\r\n\x1a\n"));
        assert!(!png.is_empty());
    }

    #[test]
    fn zero_size_is_rejected() {
        assert!(DrawingSurface::new(0, 100).is_err());
        assert!(DrawingSurface::new(100, 0).is_err());
    }

    #[test]
    fn encoding_is_deterministic() {
        let a = DrawingSurface::new(40, 24).unwrap().into_png().unwrap();
        let b = DrawingSurface::new(40, 24).unwrap().into_png().unwrap();
        assert_eq!(a, b);
    }
}
